//! Centralized configuration and builder for QuiverCkpt.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - CkptConfig::from_env() reads QCK_* env vars; builder overrides on top.
//!
//! Defaults:
//! - codec = none (QCK_CODEC=none|zstd), zstd_level = 3, compress_min_bytes = 4096
//! - fsync = true (finish() делает файл durable перед rename)
//! - verify_crc = true (CRC32C каждой записи проверяется при чтении данных)
//! - mmap = true (иначе файл целиком читается в RAM)
//! - strict_overlap = false (перекрывающиеся слайсы одного имени разрешены, побеждает поздний)

use std::fmt;

use crate::consts::{CODEC_NONE, CODEC_ZSTD};

#[inline]
fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    let s = v.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[inline]
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse::<T>().ok()
}

/// Parse codec name ("none" | "zstd"), case-insensitive.
pub fn parse_codec(s: &str) -> Option<u8> {
    match s.trim().to_ascii_lowercase().as_str() {
        "none" | "raw" | "0" => Some(CODEC_NONE),
        "zstd" | "1" => Some(CODEC_ZSTD),
        _ => None,
    }
}

pub fn codec_name(codec: u8) -> &'static str {
    match codec {
        CODEC_NONE => "none",
        CODEC_ZSTD => "zstd",
        _ => "unknown",
    }
}

/// Top-level configuration for checkpoint writers/readers.
#[derive(Clone, Debug)]
pub struct CkptConfig {
    /// Record payload codec.
    /// Env: QCK_CODEC = none|zstd (default none)
    pub codec: u8,

    /// zstd compression level.
    /// Env: QCK_ZSTD_LEVEL (default 3)
    pub zstd_level: i32,

    /// Payloads shorter than this are stored raw even with codec=zstd.
    /// Env: QCK_COMPRESS_MIN_BYTES (default 4096)
    pub compress_min_bytes: usize,

    /// fsync the finished file (and its directory) before/after rename.
    /// Env: QCK_FSYNC (default true)
    pub fsync: bool,

    /// Verify per-record CRC32C on every data read.
    /// Env: QCK_VERIFY_CRC (default true)
    pub verify_crc: bool,

    /// Map the checkpoint file instead of reading it into RAM.
    /// Env: QCK_MMAP (default true)
    pub mmap: bool,

    /// Reject a save whose slice overlaps an already pending slice of the same tensor.
    /// Env: QCK_STRICT_OVERLAP (default false)
    pub strict_overlap: bool,
}

impl Default for CkptConfig {
    fn default() -> Self {
        Self {
            codec: CODEC_NONE,
            zstd_level: 3,
            compress_min_bytes: 4096,
            fsync: true,
            verify_crc: true,
            mmap: true,
            strict_overlap: false,
        }
    }
}

impl CkptConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("QCK_CODEC") {
            if let Some(c) = parse_codec(&v) {
                cfg.codec = c;
            }
        }
        if let Some(n) = env_parse::<i32>("QCK_ZSTD_LEVEL") {
            cfg.zstd_level = n;
        }
        if let Some(n) = env_parse::<usize>("QCK_COMPRESS_MIN_BYTES") {
            cfg.compress_min_bytes = n;
        }
        if let Some(on) = env_flag("QCK_FSYNC") {
            cfg.fsync = on;
        }
        if let Some(on) = env_flag("QCK_VERIFY_CRC") {
            cfg.verify_crc = on;
        }
        if let Some(on) = env_flag("QCK_MMAP") {
            cfg.mmap = on;
        }
        if let Some(on) = env_flag("QCK_STRICT_OVERLAP") {
            cfg.strict_overlap = on;
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_codec(mut self, codec: u8) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    pub fn with_compress_min_bytes(mut self, n: usize) -> Self {
        self.compress_min_bytes = n;
        self
    }

    pub fn with_fsync(mut self, on: bool) -> Self {
        self.fsync = on;
        self
    }

    pub fn with_verify_crc(mut self, on: bool) -> Self {
        self.verify_crc = on;
        self
    }

    pub fn with_mmap(mut self, on: bool) -> Self {
        self.mmap = on;
        self
    }

    pub fn with_strict_overlap(mut self, on: bool) -> Self {
        self.strict_overlap = on;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for CkptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CkptConfig {{ \
             codec: {}, \
             zstd_level: {}, \
             compress_min_bytes: {}, \
             fsync: {}, \
             verify_crc: {}, \
             mmap: {}, \
             strict_overlap: {} \
             }}",
            codec_name(self.codec),
            self.zstd_level,
            self.compress_min_bytes,
            self.fsync,
            self.verify_crc,
            self.mmap,
            self.strict_overlap,
        )
    }
}

/// Lightweight builder that produces a CkptConfig.
#[derive(Clone, Debug)]
pub struct CkptBuilder {
    cfg: CkptConfig,
}

impl Default for CkptBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: CkptConfig::from_env(),
        }
    }
}

impl CkptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: CkptConfig::default(),
        }
    }

    pub fn codec(mut self, codec: u8) -> Self {
        self.cfg.codec = codec;
        self
    }

    pub fn zstd_level(mut self, level: i32) -> Self {
        self.cfg.zstd_level = level;
        self
    }

    pub fn compress_min_bytes(mut self, n: usize) -> Self {
        self.cfg.compress_min_bytes = n;
        self
    }

    pub fn fsync(mut self, on: bool) -> Self {
        self.cfg.fsync = on;
        self
    }

    pub fn verify_crc(mut self, on: bool) -> Self {
        self.cfg.verify_crc = on;
        self
    }

    pub fn mmap(mut self, on: bool) -> Self {
        self.cfg.mmap = on;
        self
    }

    pub fn strict_overlap(mut self, on: bool) -> Self {
        self.cfg.strict_overlap = on;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> CkptConfig {
        self.cfg
    }
}
