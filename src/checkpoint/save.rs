//! checkpoint/save: пакетные точки входа: целые тензоры и слайсы по строкам
//! "форма + слайс".

use anyhow::{Context, Result};
use std::path::Path;

use super::writer::{CheckpointWriter, WriteSummary};
use crate::config::CkptConfig;
use crate::error::validation;
use crate::slice::parse_shape_and_slice;
use crate::tensor::Tensor;

fn check_counts(what: &str, a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(validation(format!(
            "got {} {} for {} tensor name(s)",
            a, what, b
        )));
    }
    Ok(())
}

/// Сохранить тензоры целиком под именами `names`.
pub fn save_tensors(path: impl AsRef<Path>, names: &[&str], tensors: &[Tensor]) -> Result<WriteSummary> {
    save_tensors_with_config(path, names, tensors, CkptConfig::from_env())
}

pub fn save_tensors_with_config(
    path: impl AsRef<Path>,
    names: &[&str],
    tensors: &[Tensor],
    cfg: CkptConfig,
) -> Result<WriteSummary> {
    check_counts("tensor(s)", tensors.len(), names.len())?;
    let mut w = CheckpointWriter::create_with_config(path, cfg)?;
    for (name, t) in names.iter().zip(tensors) {
        w.add(name, t)
            .with_context(|| format!("save tensor '{}'", name))?;
    }
    w.finish()
}

/// Сохранить тензоры, часть из которых: слайсы больших логических тензоров.
///
/// Пустая строка в `shapes_and_slices`: тензор целиком; иначе "dim0 ... dimN <slice>",
/// и длины слайса обязаны совпасть с формой переданного тензора.
pub fn save_tensor_slices(
    path: impl AsRef<Path>,
    names: &[&str],
    shapes_and_slices: &[&str],
    tensors: &[Tensor],
) -> Result<WriteSummary> {
    save_tensor_slices_with_config(path, names, shapes_and_slices, tensors, CkptConfig::from_env())
}

pub fn save_tensor_slices_with_config(
    path: impl AsRef<Path>,
    names: &[&str],
    shapes_and_slices: &[&str],
    tensors: &[Tensor],
    cfg: CkptConfig,
) -> Result<WriteSummary> {
    check_counts("tensor(s)", tensors.len(), names.len())?;
    check_counts("shape-and-slice spec(s)", shapes_and_slices.len(), names.len())?;

    let mut w = CheckpointWriter::create_with_config(path, cfg)?;
    for ((name, spec), t) in names.iter().zip(shapes_and_slices).zip(tensors) {
        if spec.trim().is_empty() {
            w.add(name, t)
                .with_context(|| format!("save tensor '{}'", name))?;
            continue;
        }
        let (shape, slice) = parse_shape_and_slice(spec)?;
        let lens = slice.lengths(&shape);
        if lens.as_slice() != t.shape().dims() {
            return Err(validation(format!(
                "tensor '{}': slice '{}' of {} has lengths {:?}, but the tensor has shape {}",
                name,
                slice,
                shape,
                lens,
                t.shape()
            )));
        }
        w.add_slice(name, &shape, Some(&slice), t.data())
            .with_context(|| format!("save tensor '{}' slice '{}'", name, spec))?;
    }
    w.finish()
}
