//! checkpoint/record: заголовок значения записи (метаданные фрагмента).
//!
//! Формат value (LE):
//!   [u8 version=1][u8 dtype][u8 codec][u8 reserved=0]
//!   [u64 seq]
//!   [u32 rank][rank × u64 dims]
//!   [u32 slice_rank][на измерение: u8 kind (0=full, 1=range), u64 start, u64 len]
//!   [u64 elem_count][u64 raw_len][u64 stored_len]
//!   [stored_len байт payload]
//!
//! seq: порядковый номер регистрации фрагмента (last-write-wins при перекрытиях).

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{CODEC_NONE, CODEC_ZSTD, RECORD_VERSION, STRING_LEN_PREFIX};
use crate::dtype::DataType;
use crate::error::format_err;
use crate::shape::TensorShape;
use crate::slice::{Extent, TensorSlice};

const EXTENT_FULL: u8 = 0;
const EXTENT_RANGE: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentHeader {
    pub dtype: DataType,
    pub codec: u8,
    pub seq: u64,
    pub shape: TensorShape,
    pub slice: TensorSlice,
    pub elem_count: u64,
    pub raw_len: u64,
    pub stored_len: u64,
}

impl FragmentHeader {
    /// Длина заголовка в байтах.
    pub fn encoded_len(&self) -> usize {
        4 + 8 + 4 + 8 * self.shape.rank() + 4 + 17 * self.slice.rank() + 24
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let mut b8 = [0u8; 8];
        let mut b4 = [0u8; 4];
        out.extend_from_slice(&[RECORD_VERSION, self.dtype.to_u8(), self.codec, 0]);
        LittleEndian::write_u64(&mut b8, self.seq);
        out.extend_from_slice(&b8);

        LittleEndian::write_u32(&mut b4, self.shape.rank() as u32);
        out.extend_from_slice(&b4);
        for &d in self.shape.dims() {
            LittleEndian::write_u64(&mut b8, d);
            out.extend_from_slice(&b8);
        }

        LittleEndian::write_u32(&mut b4, self.slice.rank() as u32);
        out.extend_from_slice(&b4);
        for e in self.slice.extents() {
            let (kind, start, len) = match *e {
                Extent::Full => (EXTENT_FULL, 0, 0),
                Extent::Range { start, len } => (EXTENT_RANGE, start, len),
            };
            out.push(kind);
            LittleEndian::write_u64(&mut b8, start);
            out.extend_from_slice(&b8);
            LittleEndian::write_u64(&mut b8, len);
            out.extend_from_slice(&b8);
        }

        for v in [self.elem_count, self.raw_len, self.stored_len] {
            LittleEndian::write_u64(&mut b8, v);
            out.extend_from_slice(&b8);
        }
    }

    /// Разобрать заголовок. Возвращает (заголовок, смещение payload внутри value).
    /// Проверяет, что payload ровно stored_len байт до конца value.
    pub fn decode(value: &[u8]) -> Result<(Self, usize)> {
        let mut r = Cursor { buf: value, pos: 0 };
        let fixed = r.take(4)?;
        let (version, dtype_code, codec) = (fixed[0], fixed[1], fixed[2]);
        if version != RECORD_VERSION {
            return Err(format_err(format!(
                "unsupported record version {} (expected {})",
                version, RECORD_VERSION
            )));
        }
        let dtype = DataType::from_u8(dtype_code)
            .ok_or_else(|| format_err(format!("unknown dtype code {}", dtype_code)))?;
        if codec != CODEC_NONE && codec != CODEC_ZSTD {
            return Err(format_err(format!("unknown record codec {}", codec)));
        }
        let seq = r.u64()?;

        let rank = r.u32()? as usize;
        let mut dims = Vec::with_capacity(rank.min(64));
        for _ in 0..rank {
            dims.push(r.u64()?);
        }
        let shape = TensorShape::new(dims);

        let slice_rank = r.u32()? as usize;
        let mut extents = Vec::with_capacity(slice_rank.min(64));
        for _ in 0..slice_rank {
            let kind = r.take(1)?[0];
            let start = r.u64()?;
            let len = r.u64()?;
            extents.push(match kind {
                EXTENT_FULL => Extent::Full,
                EXTENT_RANGE => Extent::Range { start, len },
                other => return Err(format_err(format!("unknown extent kind {}", other))),
            });
        }
        let slice = TensorSlice::new(extents);
        slice.validate(&shape).map_err(|e| format_err(format!("record slice: {:#}", e)))?;

        let elem_count = r.u64()?;
        let raw_len = r.u64()?;
        let stored_len = r.u64()?;
        if elem_count != slice.num_elements(&shape) {
            return Err(format_err(format!(
                "record holds {} element(s), slice '{}' of {} needs {}",
                elem_count,
                slice,
                shape,
                slice.num_elements(&shape)
            )));
        }
        check_payload_lens(dtype, codec, elem_count, raw_len, stored_len)?;
        let data_off = r.pos;
        if (value.len() - data_off) as u64 != stored_len {
            return Err(format_err(format!(
                "record payload is {} B, header says {}",
                value.len() - data_off,
                stored_len
            )));
        }

        Ok((
            Self {
                dtype,
                codec,
                seq,
                shape,
                slice,
                elem_count,
                raw_len,
                stored_len,
            },
            data_off,
        ))
    }
}

/// raw_len обязан соответствовать elem_count и ширине dtype (строки: не меньше
/// префиксов длины); без сжатия stored_len == raw_len.
fn check_payload_lens(
    dtype: DataType,
    codec: u8,
    elem_count: u64,
    raw_len: u64,
    stored_len: u64,
) -> Result<()> {
    match dtype.fixed_width() {
        Some(w) => {
            let want = elem_count.checked_mul(w as u64).ok_or_else(|| {
                format_err(format!("{} element(s) of {} overflow the raw length", elem_count, dtype))
            })?;
            if raw_len != want {
                return Err(format_err(format!(
                    "raw length {} != {} element(s) x {} B of {}",
                    raw_len, elem_count, w, dtype
                )));
            }
        }
        None => {
            let min = elem_count
                .checked_mul(STRING_LEN_PREFIX as u64)
                .ok_or_else(|| format_err(format!("{} string element(s) overflow", elem_count)))?;
            if raw_len < min {
                return Err(format_err(format!(
                    "raw length {} is too short for {} string element(s)",
                    raw_len, elem_count
                )));
            }
        }
    }
    if codec == CODEC_NONE && stored_len != raw_len {
        return Err(format_err(format!(
            "uncompressed record stores {} B, raw length says {}",
            stored_len, raw_len
        )));
    }
    Ok(())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(format_err(format!(
                "record header truncated at byte {} (need {} more)",
                self.pos, n
            )));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }
}
