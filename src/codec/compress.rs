//! codec/compress: компрессия payload фрагмента (per record).
//!
//! Политика:
//! - CODEC_NONE: байты как есть;
//! - CODEC_ZSTD: zstd::bulk c уровнем из конфига; payload короче compress_min_bytes
//!   или не сжавшийся хранится как CODEC_NONE (кодек пишется в каждую запись отдельно).

use anyhow::{anyhow, Result};
use std::borrow::Cow;
use std::io::Read;

use crate::config::CkptConfig;
use crate::consts::{CODEC_NONE, CODEC_ZSTD};
use crate::error::format_err;

/// Сжать payload по политике конфига. Возвращает (codec, stored bytes).
pub fn compress_payload(raw: Vec<u8>, cfg: &CkptConfig) -> Result<(u8, Vec<u8>)> {
    if cfg.codec != CODEC_ZSTD || raw.len() < cfg.compress_min_bytes {
        return Ok((CODEC_NONE, raw));
    }
    let packed = zstd::bulk::compress(&raw, cfg.zstd_level)
        .map_err(|e| anyhow!("zstd compress {} B: {}", raw.len(), e))?;
    if packed.len() >= raw.len() {
        return Ok((CODEC_NONE, raw));
    }
    Ok((CODEC_ZSTD, packed))
}

/// Восстановить исходные байты. raw_len: длина до сжатия из заголовка записи.
pub fn decompress_payload(codec: u8, stored: &[u8], raw_len: u64) -> Result<Cow<'_, [u8]>> {
    match codec {
        CODEC_NONE => {
            if stored.len() as u64 != raw_len {
                return Err(format_err(format!(
                    "raw payload length {} != recorded {}",
                    stored.len(),
                    raw_len
                )));
            }
            Ok(Cow::Borrowed(stored))
        }
        CODEC_ZSTD => {
            // Потоковая распаковка: буфер растёт по фактическим данным, а не по
            // raw_len из заголовка; больше raw_len + 1 байт не читаем.
            let mut out = Vec::new();
            zstd::stream::read::Decoder::new(stored)
                .map_err(|e| format_err(format!("zstd decoder: {}", e)))?
                .take(raw_len.saturating_add(1))
                .read_to_end(&mut out)
                .map_err(|e| format_err(format!("zstd decompress: {}", e)))?;
            if out.len() as u64 != raw_len {
                return Err(format_err(format!(
                    "zstd payload decoded to {} B, recorded {}",
                    out.len(),
                    raw_len
                )));
            }
            Ok(Cow::Owned(out))
        }
        other => Err(format_err(format!("unknown record codec {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_applies_above_threshold_only() {
        let cfg = CkptConfig::default()
            .with_codec(CODEC_ZSTD)
            .with_compress_min_bytes(64);

        let small = vec![7u8; 16];
        let (c, s) = compress_payload(small.clone(), &cfg).unwrap();
        assert_eq!(c, CODEC_NONE);
        assert_eq!(s, small);

        let big = vec![7u8; 4096];
        let (c, s) = compress_payload(big.clone(), &cfg).unwrap();
        assert_eq!(c, CODEC_ZSTD);
        assert!(s.len() < big.len());

        let back = decompress_payload(c, &s, big.len() as u64).unwrap();
        assert_eq!(back.as_ref(), big.as_slice());
    }

    #[test]
    fn length_mismatch_is_detected() {
        assert!(decompress_payload(CODEC_NONE, &[1, 2, 3], 4).is_err());
        assert!(decompress_payload(9, &[], 0).is_err());
    }

    #[test]
    fn zstd_raw_length_is_not_trusted() {
        let raw = vec![3u8; 1000];
        let packed = zstd::bulk::compress(&raw, 3).unwrap();
        // Заявлено больше, чем есть в кадре: ошибка, без выделения заявленного объёма.
        assert!(decompress_payload(CODEC_ZSTD, &packed, 1 << 46).is_err());
        assert!(decompress_payload(CODEC_ZSTD, &packed, 999).is_err());
        assert!(decompress_payload(CODEC_ZSTD, b"not a zstd frame", 16).is_err());
        let back = decompress_payload(CODEC_ZSTD, &packed, 1000).unwrap();
        assert_eq!(back.len(), 1000);
    }
}
