//! slice/spec: строковый синтаксис слайсов (только на границах API).
//!
//! Слайс: измерения через ':', каждое: '-' (Full) или "start,length".
//!   "-:0,2" : первое измерение целиком, во втором элементы [0,2).
//!   ""      : слайс ранга 0 (скаляр целиком).
//!
//! Строка "форма + слайс": "dim0 dim1 ... dimN <slice>" через пробелы.
//!   "2 4 -:0,2": слайс 2x2 логического тензора 2x4.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

use super::{Extent, TensorSlice};
use crate::error::validation;
use crate::shape::TensorShape;

impl fmt::Display for TensorSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.extents().iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            match e {
                Extent::Full => f.write_str("-")?,
                Extent::Range { start, len } => write!(f, "{},{}", start, len)?,
            }
        }
        Ok(())
    }
}

fn parse_extent(part: &str, whole: &str) -> Result<Extent> {
    let part = part.trim();
    if part == "-" {
        return Ok(Extent::Full);
    }
    let (a, b) = part
        .split_once(',')
        .ok_or_else(|| validation(format!("slice '{}': bad dimension spec '{}'", whole, part)))?;
    let start = a
        .trim()
        .parse::<u64>()
        .map_err(|e| validation(format!("slice '{}': bad start '{}': {}", whole, a, e)))?;
    let len = b
        .trim()
        .parse::<u64>()
        .map_err(|e| validation(format!("slice '{}': bad length '{}': {}", whole, b, e)))?;
    if len == 0 {
        return Err(validation(format!("slice '{}': length must be > 0", whole)));
    }
    if start.checked_add(len).is_none() {
        return Err(validation(format!("slice '{}': range {},{} overflows", whole, start, len)));
    }
    Ok(Extent::Range { start, len })
}

impl FromStr for TensorSlice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        if t.is_empty() {
            return Ok(TensorSlice::full(0));
        }
        let extents = t
            .split(':')
            .map(|p| parse_extent(p, t))
            .collect::<Result<Vec<_>>>()?;
        Ok(TensorSlice::new(extents))
    }
}

/// Разобрать "dim0 ... dimN <slice>" в (форма, слайс). Слайс проверяется против формы.
pub fn parse_shape_and_slice(spec: &str) -> Result<(TensorShape, TensorSlice)> {
    let parts: Vec<&str> = spec.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(validation(format!(
            "shape-and-slice '{}': need at least one dimension and a slice",
            spec
        )));
    }
    let (dims_s, slice_s) = parts.split_at(parts.len() - 1);
    let dims = dims_s
        .iter()
        .map(|d| {
            d.parse::<u64>()
                .map_err(|e| validation(format!("shape-and-slice '{}': bad dim '{}': {}", spec, d, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    let shape = TensorShape::new(dims);
    let slice: TensorSlice = slice_s[0].parse()?;
    slice.validate(&shape)?;
    Ok((shape, slice))
}

/// Обратная операция к parse_shape_and_slice.
pub fn format_shape_and_slice(shape: &TensorShape, slice: &TensorSlice) -> String {
    let mut out = String::new();
    for d in shape.dims() {
        out.push_str(&d.to_string());
        out.push(' ');
    }
    out.push_str(&slice.to_string());
    out
}
