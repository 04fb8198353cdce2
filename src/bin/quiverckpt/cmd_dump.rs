use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::PathBuf;

use QuiverCkpt::checkpoint::CheckpointReader;
use QuiverCkpt::{TensorData, TensorSlice};

#[derive(Serialize)]
struct DumpOut<'a> {
    name: &'a str,
    slice: String,
    shape: Vec<u64>,
    #[serde(flatten)]
    data: &'a TensorData,
}

pub fn exec(path: PathBuf, name: String, slice: Option<String>, json: bool) -> Result<()> {
    let r = CheckpointReader::open(&path)?;
    let (shape, _) = r
        .has_tensor(&name)
        .ok_or_else(|| anyhow!("tensor '{}' not found in {}", name, path.display()))?;

    let slice: TensorSlice = match slice {
        Some(s) => s.parse()?,
        None => TensorSlice::full(shape.rank()),
    };
    let data = r.read_slice(&name, &slice)?.ok_or_else(|| {
        anyhow!(
            "region '{}' of tensor '{}' is not fully covered by saved slices",
            slice,
            name
        )
    })?;

    if json {
        let out = DumpOut {
            name: &name,
            slice: slice.to_string(),
            shape: slice.lengths(&shape),
            data: &data,
        };
        println!("{}", serde_json::to_string(&out)?);
        return Ok(());
    }

    let lens = slice.lengths(&shape);
    println!("{} [{}] {} {:?}", name, slice, data.dtype(), lens);
    let values = data.to_strings();
    // Строки по последнему измерению.
    let row = lens.last().copied().unwrap_or(1).max(1) as usize;
    for chunk in values.chunks(row) {
        println!("  {}", chunk.join(" "));
    }
    Ok(())
}
