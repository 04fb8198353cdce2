//! checkpoint/copy: перенос прямоугольной области между двумя буферами.
//!
//! Оба буфера разложены row-major по своим слайсам одного логического тензора;
//! region лежит внутри обоих. Внутреннее измерение копируется непрерывным отрезком,
//! внешние перебираются «одометром».

use anyhow::Result;

use crate::error::format_err;
use crate::shape::TensorShape;
use crate::slice::TensorSlice;

pub fn copy_region<T: Clone>(
    shape: &TensorShape,
    region: &TensorSlice,
    src_slice: &TensorSlice,
    src: &[T],
    dst_slice: &TensorSlice,
    dst: &mut [T],
) -> Result<()> {
    let rank = region.rank();
    let lens = region.lengths(shape);
    if lens.iter().any(|&l| l == 0) {
        return Ok(());
    }
    for (which, slice) in [("source", src_slice), ("destination", dst_slice)] {
        if !region.is_subset_of(slice, shape) {
            return Err(format_err(format!(
                "copy region '{}' lies outside the {} slice '{}'",
                region, which, slice
            )));
        }
    }
    let lo: Vec<u64> = (0..rank).map(|d| region.bounds(d, shape).0).collect();
    let run = lens.last().copied().unwrap_or(1) as usize;

    // Страйды и стартовые смещения считаются один раз; дальше смещения сдвигаются
    // вместе с «одометром».
    let src_strides = src_slice.strides(shape);
    let dst_strides = dst_slice.strides(shape);
    let start = |slice: &TensorSlice, strides: &[u64]| -> u64 {
        (0..rank)
            .map(|d| (lo[d] - slice.bounds(d, shape).0) * strides[d])
            .sum()
    };
    let mut s = start(src_slice, &src_strides);
    let mut t = start(dst_slice, &dst_strides);

    let mut point = lo.clone();
    loop {
        let (su, tu) = (s as usize, t as usize);
        let (src_run, dst_run) = match (src.get(su..su + run), dst.get_mut(tu..tu + run)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(format_err(format!(
                    "copy region '{}': buffer too short for run at {:?}",
                    region, point
                )))
            }
        };
        dst_run.clone_from_slice(src_run);

        // Следующая строка: инкремент по измерениям 0..rank-1 (последнее: сам отрезок).
        let mut dim = rank.saturating_sub(1);
        loop {
            if dim == 0 {
                return Ok(());
            }
            dim -= 1;
            point[dim] += 1;
            s += src_strides[dim];
            t += dst_strides[dim];
            if point[dim] < lo[dim] + lens[dim] {
                break;
            }
            point[dim] = lo[dim];
            s -= lens[dim] * src_strides[dim];
            t -= lens[dim] * dst_strides[dim];
        }
    }
}
