//! shape: логическая форма тензора (упорядоченные размеры, все >= 0).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TensorShape {
    dims: Vec<u64>,
}

impl TensorShape {
    pub fn new(dims: impl Into<Vec<u64>>) -> Self {
        Self { dims: dims.into() }
    }

    /// Скаляр (rank 0).
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    #[inline]
    pub fn dim(&self, d: usize) -> u64 {
        self.dims[d]
    }

    /// Произведение размеров (1 для скаляра). Saturating, чтобы мусорный заголовок
    /// не приводил к панике при переполнении.
    pub fn num_elements(&self) -> u64 {
        self.dims.iter().fold(1u64, |acc, &d| acc.saturating_mul(d))
    }

    pub fn is_same_size(&self, other: &TensorShape) -> bool {
        self.dims == other.dims
    }
}

impl From<&[u64]> for TensorShape {
    fn from(d: &[u64]) -> Self {
        Self::new(d.to_vec())
    }
}

impl<const N: usize> From<[u64; N]> for TensorShape {
    fn from(d: [u64; N]) -> Self {
        Self::new(d.to_vec())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}
