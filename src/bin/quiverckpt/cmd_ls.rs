use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use QuiverCkpt::checkpoint::CheckpointReader;
use QuiverCkpt::DataType;

#[derive(Serialize)]
struct TensorRow {
    name: String,
    dtype: DataType,
    shape: Vec<u64>,
    slices: Vec<String>,
    complete: bool,
}

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let r = CheckpointReader::open(&path)?;

    let mut rows = Vec::with_capacity(r.len());
    for name in r.tensor_names() {
        let set = match r.slice_set(name) {
            Some(s) => s,
            None => continue,
        };
        let full = QuiverCkpt::TensorSlice::full(set.shape().rank());
        rows.push(TensorRow {
            name: name.to_string(),
            dtype: set.dtype(),
            shape: set.shape().dims().to_vec(),
            slices: set.fragments().iter().map(|f| f.slice.to_string()).collect(),
            complete: set.covers(&full),
        });
    }

    if json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("(no tensors)");
        return Ok(());
    }
    for row in rows {
        let slices: Vec<String> = row
            .slices
            .iter()
            .map(|s| if s.is_empty() { "<scalar>".to_string() } else { s.clone() })
            .collect();
        println!(
            "{} {} {:?}{} slices=[{}]",
            row.name,
            row.dtype,
            row.shape,
            if row.complete { "" } else { " (partial)" },
            slices.join(" ")
        );
    }
    Ok(())
}
