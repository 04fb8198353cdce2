//! Lightweight global metrics for QuiverCkpt.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Writer (фрагменты, байты, завершённые файлы)
//! - Reader (открытия, индексированные записи)
//! - copy_slice_data (вызовы, попадания, промахи покрытия, отсутствующие имена)
//! - Целостность (CRC failures)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Writer -----
static FRAGMENTS_SAVED: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static FILES_FINISHED: AtomicU64 = AtomicU64::new(0);

// ----- Reader -----
static FILES_OPENED: AtomicU64 = AtomicU64::new(0);
static RECORDS_INDEXED: AtomicU64 = AtomicU64::new(0);

// ----- copy_slice_data -----
static COPY_CALLS: AtomicU64 = AtomicU64::new(0);
static COPY_HITS: AtomicU64 = AtomicU64::new(0);
static COPY_COVERAGE_MISSES: AtomicU64 = AtomicU64::new(0);
static COPY_NOT_FOUND: AtomicU64 = AtomicU64::new(0);
static ELEMENTS_COPIED: AtomicU64 = AtomicU64::new(0);
static FRAGMENT_BYTES_READ: AtomicU64 = AtomicU64::new(0);

// ----- Integrity -----
static CRC_FAILURES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Writer
    pub fragments_saved: u64,
    pub bytes_written: u64,
    pub files_finished: u64,

    // Reader
    pub files_opened: u64,
    pub records_indexed: u64,

    // copy_slice_data
    pub copy_calls: u64,
    pub copy_hits: u64,
    pub copy_coverage_misses: u64,
    pub copy_not_found: u64,
    pub elements_copied: u64,
    pub fragment_bytes_read: u64,

    // Integrity
    pub crc_failures: u64,
}

impl MetricsSnapshot {
    /// Доля успешных copy_slice_data среди всех вызовов.
    pub fn copy_hit_ratio(&self) -> f64 {
        if self.copy_calls == 0 {
            0.0
        } else {
            self.copy_hits as f64 / self.copy_calls as f64
        }
    }
}

// ----- Recorders (Writer) -----
pub fn record_fragment_saved() {
    FRAGMENTS_SAVED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_file_finished(bytes: u64) {
    FILES_FINISHED.fetch_add(1, Ordering::Relaxed);
    BYTES_WRITTEN.fetch_add(bytes, Ordering::Relaxed);
}

// ----- Recorders (Reader) -----
pub fn record_file_opened(records: u64) {
    FILES_OPENED.fetch_add(1, Ordering::Relaxed);
    RECORDS_INDEXED.fetch_add(records, Ordering::Relaxed);
}

// ----- Recorders (copy_slice_data) -----
pub fn record_copy_call() {
    COPY_CALLS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_copy_hit(elements: u64) {
    COPY_HITS.fetch_add(1, Ordering::Relaxed);
    ELEMENTS_COPIED.fetch_add(elements, Ordering::Relaxed);
}
pub fn record_copy_coverage_miss() {
    COPY_COVERAGE_MISSES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_copy_not_found() {
    COPY_NOT_FOUND.fetch_add(1, Ordering::Relaxed);
}
pub fn record_fragment_read(bytes: u64) {
    FRAGMENT_BYTES_READ.fetch_add(bytes, Ordering::Relaxed);
}

// ----- Recorders (Integrity) -----
pub fn record_crc_failure() {
    CRC_FAILURES.fetch_add(1, Ordering::Relaxed);
}

/// Снимок всех счётчиков.
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        fragments_saved: FRAGMENTS_SAVED.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
        files_finished: FILES_FINISHED.load(Ordering::Relaxed),

        files_opened: FILES_OPENED.load(Ordering::Relaxed),
        records_indexed: RECORDS_INDEXED.load(Ordering::Relaxed),

        copy_calls: COPY_CALLS.load(Ordering::Relaxed),
        copy_hits: COPY_HITS.load(Ordering::Relaxed),
        copy_coverage_misses: COPY_COVERAGE_MISSES.load(Ordering::Relaxed),
        copy_not_found: COPY_NOT_FOUND.load(Ordering::Relaxed),
        elements_copied: ELEMENTS_COPIED.load(Ordering::Relaxed),
        fragment_bytes_read: FRAGMENT_BYTES_READ.load(Ordering::Relaxed),

        crc_failures: CRC_FAILURES.load(Ordering::Relaxed),
    }
}

/// Сброс всех счётчиков (для тестов/бенчей).
pub fn reset() {
    for c in [
        &FRAGMENTS_SAVED,
        &BYTES_WRITTEN,
        &FILES_FINISHED,
        &FILES_OPENED,
        &RECORDS_INDEXED,
        &COPY_CALLS,
        &COPY_HITS,
        &COPY_COVERAGE_MISSES,
        &COPY_NOT_FOUND,
        &ELEMENTS_COPIED,
        &FRAGMENT_BYTES_READ,
        &CRC_FAILURES,
    ] {
        c.store(0, Ordering::Relaxed);
    }
}
