//! checkpoint/doctor: полная проверка файла чекпоинта и отчёт (текст или JSON).
//!
//! В отличие от CheckpointReader::open(), doctor не останавливается на первой плохой
//! записи: каждая запись проверяется отдельно, а итог собирается в DoctorReport.
//!
//! Семантика по записи:
//! - CRC32C key||value не сошёлся -> crc_fail;
//! - ключ/заголовок не разбираются, слайс ключа != слайсу заголовка, форма/dtype
//!   расходятся с другими фрагментами имени -> bad_records;
//! - payload не распаковывается (zstd/длины/строки) -> bad_records;
//! - иначе ok_records.
//!
//! Для тензоров дополнительно: incomplete_tensors: имена, чьи фрагменты не покрывают
//! форму целиком (информативно: частичное сохранение легально).

use anyhow::Result;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::key::decode_key;
use super::record::FragmentHeader;
use super::slice_set::SliceSet;
use crate::codec::{decompress_payload, TensorData};
use crate::config::CkptConfig;
use crate::slice::TensorSlice;
use crate::table::Table;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoctorReport {
    pub path: String,
    pub file_len: u64,
    pub records: u64,
    pub ok_records: u64,
    pub crc_fail: u64,
    pub bad_records: u64,
    pub tensors: u64,
    pub incomplete_tensors: Vec<String>,
    /// Первые ошибки по записям (не более MAX_ERRORS).
    pub errors: Vec<String>,
}

const MAX_ERRORS: usize = 16;

impl DoctorReport {
    pub fn is_ok(&self) -> bool {
        self.crc_fail == 0 && self.bad_records == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Человекочитаемый отчёт.
    pub fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Doctor report for {}:\n", self.path));
        s.push_str(&format!("  file_len           = {}\n", self.file_len));
        s.push_str(&format!("  records            = {}\n", self.records));
        s.push_str(&format!("  ok_records         = {}\n", self.ok_records));
        s.push_str(&format!("  crc_fail           = {}\n", self.crc_fail));
        s.push_str(&format!("  bad_records        = {}\n", self.bad_records));
        s.push_str(&format!("  tensors            = {}\n", self.tensors));
        s.push_str(&format!("  incomplete_tensors = {}\n", self.incomplete_tensors.len()));
        for name in &self.incomplete_tensors {
            s.push_str(&format!("    - {}\n", name));
        }
        for e in &self.errors {
            s.push_str(&format!("  error: {}\n", e));
        }
        s.push_str(if self.is_ok() { "status: OK\n" } else { "status: FAILED\n" });
        s
    }

    fn note(&mut self, msg: String) {
        warn!("doctor: {}", msg);
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(msg);
        }
    }
}

/// Проверить файл. Ошибка возвращается только если таблицу невозможно открыть.
pub fn doctor(path: impl AsRef<Path>, cfg: &CkptConfig) -> Result<DoctorReport> {
    let path = path.as_ref();
    // CRC проверяется явно по каждой записи, поэтому таблица открывается без verify.
    let table = Table::open(path, cfg.mmap, false)?;

    let mut rep = DoctorReport {
        path: path.display().to_string(),
        file_len: table.file_len(),
        records: table.len() as u64,
        ..Default::default()
    };
    let mut sets: BTreeMap<String, SliceSet<()>> = BTreeMap::new();

    for (i, key) in table.iter() {
        let label = String::from_utf8_lossy(key).replace('\0', " ");
        if !table.verify_entry(i) {
            rep.crc_fail += 1;
            rep.note(format!("record {} ('{}'): crc mismatch", i, label));
            continue;
        }
        match check_record(&table, i, key, &mut sets) {
            Ok(()) => rep.ok_records += 1,
            Err(e) => {
                rep.bad_records += 1;
                rep.note(format!("record {} ('{}'): {:#}", i, label, e));
            }
        }
    }

    rep.tensors = sets.len() as u64;
    for (name, set) in &sets {
        if !set.covers(&TensorSlice::full(set.shape().rank())) {
            rep.incomplete_tensors.push(name.clone());
        }
    }
    Ok(rep)
}

fn check_record(
    table: &Table,
    i: usize,
    key: &[u8],
    sets: &mut BTreeMap<String, SliceSet<()>>,
) -> Result<()> {
    let (name, slice_str) = decode_key(key)?;
    let value = table.value_unchecked(i);
    let (hdr, data_off) = FragmentHeader::decode(value)?;
    let key_slice: TensorSlice = slice_str.parse()?;
    if key_slice != hdr.slice {
        return Err(crate::error::format_err(format!(
            "key slice '{}' disagrees with header slice '{}'",
            key_slice, hdr.slice
        )));
    }

    let raw = decompress_payload(hdr.codec, &value[data_off..], hdr.raw_len)?;
    let count = usize::try_from(hdr.elem_count)?;
    TensorData::unpack(hdr.dtype, &raw, count)?;

    let set = sets
        .entry(name.to_string())
        .or_insert_with(|| SliceSet::new(name, hdr.shape.clone(), hdr.dtype));
    set.check_compatible(&hdr.shape, hdr.dtype)?;
    set.register(hdr.slice, hdr.seq, ())
}
