use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use QuiverCkpt::checkpoint::CheckpointReader;
use QuiverCkpt::config::codec_name;
use QuiverCkpt::metrics::{self, MetricsSnapshot};

#[derive(Serialize)]
struct Stat {
    path: String,
    file_len: u64,
    records: usize,
    tensors: usize,
    stored_elements: u64,
    raw_bytes: u64,
    stored_bytes: u64,
    records_none: u64,
    records_zstd: u64,
    metrics: MetricsSnapshot,
}

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let r = CheckpointReader::open(&path)?;

    let mut st = Stat {
        path: path.display().to_string(),
        file_len: r.table().file_len(),
        records: r.table().len(),
        tensors: r.len(),
        stored_elements: 0,
        raw_bytes: 0,
        stored_bytes: 0,
        records_none: 0,
        records_zstd: 0,
        metrics: MetricsSnapshot::default(),
    };
    for name in r.tensor_names() {
        if let Some(set) = r.slice_set(name) {
            st.stored_elements += set.stored_elements();
            for f in set.fragments() {
                st.raw_bytes += f.loc.raw_len;
                st.stored_bytes += f.loc.stored_len;
                match codec_name(f.loc.codec) {
                    "zstd" => st.records_zstd += 1,
                    _ => st.records_none += 1,
                }
            }
        }
    }
    st.metrics = metrics::snapshot();

    if json {
        println!("{}", serde_json::to_string(&st)?);
        return Ok(());
    }

    println!("Checkpoint {}:", st.path);
    println!("  file_len        = {}", st.file_len);
    println!("  records         = {}", st.records);
    println!("  tensors         = {}", st.tensors);
    println!("  stored_elements = {}", st.stored_elements);
    println!("  raw_bytes       = {}", st.raw_bytes);
    println!("  stored_bytes    = {}", st.stored_bytes);
    println!("  codec           = none:{} zstd:{}", st.records_none, st.records_zstd);
    println!("Metrics:");
    println!("  files_opened    = {}", st.metrics.files_opened);
    println!("  records_indexed = {}", st.metrics.records_indexed);
    println!("  crc_failures    = {}", st.metrics.crc_failures);
    Ok(())
}
