//! slice: прямоугольные области N-мерного тензора и алгебра над ними.
//!
//! TensorSlice: по одному Extent на измерение:
//! - Full           : всё измерение [0, dim);
//! - Range{start,len}: [start, start+len), len > 0.
//!
//! Операции, которым нужен реальный размер измерения (bounds/lengths/offset/subtract),
//! принимают форму тензора явно. intersect() форма не нужна: Full ∩ X = X.
//!
//! Линейные смещения: row-major (последнее измерение самое быстрое), страйды
//! считаются от длин самого слайса: одна и та же формула работает и для буфера
//! фрагмента, и для выходного буфера вызывающего кода.

use anyhow::Result;

use crate::error::validation;
use crate::shape::TensorShape;

pub mod coverage;
pub mod spec;

pub use coverage::Coverage;
pub use spec::{format_shape_and_slice, parse_shape_and_slice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extent {
    Full,
    Range { start: u64, len: u64 },
}

impl Extent {
    /// [start, end) в измерении размера `dim`.
    #[inline]
    pub fn bounds(self, dim: u64) -> (u64, u64) {
        match self {
            Extent::Full => (0, dim),
            Extent::Range { start, len } => (start, start.saturating_add(len)),
        }
    }

    /// Пересечение двух экстентов одного измерения. None: пусто.
    pub fn intersect(self, other: Extent) -> Option<Extent> {
        match (self, other) {
            (Extent::Full, x) | (x, Extent::Full) => Some(x),
            (Extent::Range { start: a, len: al }, Extent::Range { start: b, len: bl }) => {
                let lo = a.max(b);
                let hi = a.saturating_add(al).min(b.saturating_add(bl));
                if hi > lo {
                    Some(Extent::Range { start: lo, len: hi - lo })
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorSlice {
    extents: Vec<Extent>,
}

impl TensorSlice {
    pub fn new(extents: Vec<Extent>) -> Self {
        Self { extents }
    }

    /// Слайс "весь тензор" заданного ранга.
    pub fn full(rank: usize) -> Self {
        Self {
            extents: vec![Extent::Full; rank],
        }
    }

    /// Построить слайс из пар [start, end) на форме: [0, dim) превращается в Full.
    pub fn from_bounds(shape: &TensorShape, bounds: &[(u64, u64)]) -> Self {
        let extents = bounds
            .iter()
            .enumerate()
            .map(|(d, &(lo, hi))| {
                if lo == 0 && d < shape.rank() && hi == shape.dim(d) {
                    Extent::Full
                } else {
                    Extent::Range { start: lo, len: hi - lo }
                }
            })
            .collect();
        Self { extents }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    #[inline]
    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    #[inline]
    pub fn extent(&self, d: usize) -> Extent {
        self.extents[d]
    }

    pub fn is_full(&self) -> bool {
        self.extents.iter().all(|e| *e == Extent::Full)
    }

    /// Проверка против формы: ранг, len > 0, start+len <= dim.
    pub fn validate(&self, shape: &TensorShape) -> Result<()> {
        if self.rank() != shape.rank() {
            return Err(validation(format!(
                "slice '{}' has rank {}, shape {} has rank {}",
                self,
                self.rank(),
                shape,
                shape.rank()
            )));
        }
        for (d, e) in self.extents.iter().enumerate() {
            if let Extent::Range { start, len } = *e {
                if len == 0 {
                    return Err(validation(format!(
                        "slice '{}': dimension {} has zero length",
                        self, d
                    )));
                }
                let end = start.checked_add(len);
                if end.map_or(true, |end| end > shape.dim(d)) {
                    return Err(validation(format!(
                        "slice '{}': dimension {} range {},{} exceeds size {}",
                        self,
                        d,
                        start,
                        len,
                        shape.dim(d)
                    )));
                }
            }
        }
        Ok(())
    }

    /// [start, end) измерения d.
    #[inline]
    pub fn bounds(&self, d: usize, shape: &TensorShape) -> (u64, u64) {
        self.extents[d].bounds(shape.dim(d))
    }

    pub fn lengths(&self, shape: &TensorShape) -> Vec<u64> {
        (0..self.rank())
            .map(|d| {
                let (lo, hi) = self.bounds(d, shape);
                hi - lo
            })
            .collect()
    }

    pub fn num_elements(&self, shape: &TensorShape) -> u64 {
        self.lengths(shape)
            .iter()
            .fold(1u64, |acc, &l| acc.saturating_mul(l))
    }

    /// Row-major страйды буфера, разложенного по этому слайсу.
    pub fn strides(&self, shape: &TensorShape) -> Vec<u64> {
        let lens = self.lengths(shape);
        let mut strides = vec![1u64; lens.len()];
        for d in (0..lens.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * lens[d + 1];
        }
        strides
    }

    /// Пересечение двух слайсов одной формы. None, если ранги различны
    /// или хотя бы одно измерение пусто.
    pub fn intersect(&self, other: &TensorSlice) -> Option<TensorSlice> {
        if self.rank() != other.rank() {
            return None;
        }
        let extents = self
            .extents
            .iter()
            .zip(other.extents.iter())
            .map(|(a, b)| a.intersect(*b))
            .collect::<Option<Vec<_>>>()?;
        Some(TensorSlice { extents })
    }

    /// true, если каждое измерение self лежит внутри соответствующего измерения other.
    pub fn is_subset_of(&self, other: &TensorSlice, shape: &TensorShape) -> bool {
        if self.rank() != other.rank() || self.rank() != shape.rank() {
            return false;
        }
        (0..self.rank()).all(|d| {
            let (a0, a1) = self.bounds(d, shape);
            let (b0, b1) = other.bounds(d, shape);
            a1 <= a0 || (b0 <= a0 && a1 <= b1)
        })
    }

    pub fn contains_point(&self, shape: &TensorShape, point: &[u64]) -> bool {
        point.len() == self.rank()
            && point.iter().enumerate().all(|(d, &p)| {
                let (lo, hi) = self.bounds(d, shape);
                lo <= p && p < hi
            })
    }

    /// Линейный индекс абсолютной точки `point` внутри буфера этого слайса.
    /// None, если точка вне слайса.
    pub fn relative_offset(&self, shape: &TensorShape, point: &[u64]) -> Option<u64> {
        if !self.contains_point(shape, point) {
            return None;
        }
        let strides = self.strides(shape);
        Some(
            point
                .iter()
                .enumerate()
                .map(|(d, &p)| (p - self.bounds(d, shape).0) * strides[d])
                .sum(),
        )
    }

    /// Range(0, dim) -> Full. Каноническая форма используется в ключах таблицы.
    pub fn canonicalize(&self, shape: &TensorShape) -> TensorSlice {
        let bounds: Vec<(u64, u64)> = (0..self.rank()).map(|d| self.bounds(d, shape)).collect();
        TensorSlice::from_bounds(shape, &bounds)
    }

    /// Часть self, не покрытая other: не более 2·rank непересекающихся коробок.
    pub fn subtract(&self, other: &TensorSlice, shape: &TensorShape) -> Vec<TensorSlice> {
        if self.num_elements(shape) == 0 {
            return Vec::new();
        }
        let inter = match self.intersect(other) {
            Some(i) => i,
            None => return vec![self.clone()],
        };

        let mut cur: Vec<(u64, u64)> = (0..self.rank()).map(|d| self.bounds(d, shape)).collect();
        let mut pieces = Vec::new();
        for d in 0..self.rank() {
            let (a, b) = cur[d];
            let (c, e) = inter.bounds(d, shape);
            if c > a {
                let mut left = cur.clone();
                left[d] = (a, c);
                pieces.push(TensorSlice::from_bounds(shape, &left));
            }
            if e < b {
                let mut right = cur.clone();
                right[d] = (e, b);
                pieces.push(TensorSlice::from_bounds(shape, &right));
            }
            cur[d] = (c, e);
        }
        pieces
    }
}
