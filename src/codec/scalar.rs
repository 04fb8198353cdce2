//! codec/scalar: реализации Element для каждого типа элемента.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use super::{Element, TensorData};
use crate::consts::STRING_LEN_PREFIX;
use crate::dtype::{Complex64, DataType, QInt32, QInt8};
use crate::error::{format_err, validation};

/// Проверка длины буфера фиксированной ширины: bytes == count * width.
fn check_fixed_len(dtype: DataType, got: usize, count: usize, width: usize) -> Result<()> {
    let want = count
        .checked_mul(width)
        .ok_or_else(|| format_err(format!("{}: element count {} overflows", dtype, count)))?;
    if got != want {
        return Err(format_err(format!(
            "{}: expected {} byte(s) for {} element(s), got {}",
            dtype, want, count, got
        )));
    }
    Ok(())
}

macro_rules! fixed_element {
    ($t:ty, $variant:ident, $w:expr, $write:expr, $read:expr) => {
        impl Element for $t {
            const DTYPE: DataType = DataType::$variant;

            fn pack(values: &[Self], out: &mut Vec<u8>) -> Result<()> {
                let start = out.len();
                out.resize(start + values.len() * $w, 0);
                for (i, v) in values.iter().enumerate() {
                    let off = start + i * $w;
                    ($write)(&mut out[off..off + $w], *v);
                }
                Ok(())
            }

            fn unpack(bytes: &[u8], count: usize) -> Result<Vec<Self>> {
                check_fixed_len(Self::DTYPE, bytes.len(), count, $w)?;
                Ok(bytes.chunks_exact($w).map($read).collect())
            }

            fn wrap(values: Vec<Self>) -> TensorData {
                TensorData::$variant(values)
            }

            fn view(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

fixed_element!(bool, Bool, 1, |b: &mut [u8], v: bool| b[0] = u8::from(v), |c: &[u8]| c[0] != 0);
fixed_element!(u8, UInt8, 1, |b: &mut [u8], v: u8| b[0] = v, |c: &[u8]| c[0]);
fixed_element!(i8, Int8, 1, |b: &mut [u8], v: i8| b[0] = v as u8, |c: &[u8]| c[0] as i8);
fixed_element!(QInt8, QInt8, 1, |b: &mut [u8], v: QInt8| b[0] = v.0 as u8, |c: &[u8]| QInt8(c[0] as i8));
fixed_element!(i16, Int16, 2, LittleEndian::write_i16, LittleEndian::read_i16);
fixed_element!(i32, Int32, 4, LittleEndian::write_i32, LittleEndian::read_i32);
fixed_element!(i64, Int64, 8, LittleEndian::write_i64, LittleEndian::read_i64);
fixed_element!(f32, Float, 4, LittleEndian::write_f32, LittleEndian::read_f32);
fixed_element!(f64, Double, 8, LittleEndian::write_f64, LittleEndian::read_f64);
fixed_element!(
    QInt32,
    QInt32,
    4,
    |b: &mut [u8], v: QInt32| LittleEndian::write_i32(b, v.0),
    |c: &[u8]| QInt32(LittleEndian::read_i32(c))
);
fixed_element!(
    Complex64,
    Complex64,
    8,
    |b: &mut [u8], v: Complex64| {
        LittleEndian::write_f32(&mut b[0..4], v.re);
        LittleEndian::write_f32(&mut b[4..8], v.im);
    },
    |c: &[u8]| Complex64::new(LittleEndian::read_f32(&c[0..4]), LittleEndian::read_f32(&c[4..8]))
);

// Строки: [len u32 LE][utf-8 bytes] подряд.
impl Element for String {
    const DTYPE: DataType = DataType::String;

    fn pack(values: &[Self], out: &mut Vec<u8>) -> Result<()> {
        for s in values {
            let len = u32::try_from(s.len())
                .map_err(|_| validation(format!("string element of {} B is too long", s.len())))?;
            let mut pfx = [0u8; STRING_LEN_PREFIX];
            LittleEndian::write_u32(&mut pfx, len);
            out.extend_from_slice(&pfx);
            out.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }

    fn unpack(bytes: &[u8], count: usize) -> Result<Vec<Self>> {
        let mut out = Vec::with_capacity(count.min(bytes.len() / STRING_LEN_PREFIX + 1));
        let mut pos = 0usize;
        for i in 0..count {
            if pos + STRING_LEN_PREFIX > bytes.len() {
                return Err(format_err(format!("string: truncated length prefix at element {}", i)));
            }
            let len = LittleEndian::read_u32(&bytes[pos..pos + STRING_LEN_PREFIX]) as usize;
            pos += STRING_LEN_PREFIX;
            let end = pos
                .checked_add(len)
                .filter(|&e| e <= bytes.len())
                .ok_or_else(|| format_err(format!("string: element {} runs past buffer end", i)))?;
            let s = std::str::from_utf8(&bytes[pos..end])
                .map_err(|e| format_err(format!("string: element {} is not utf-8: {}", i, e)))?;
            out.push(s.to_string());
            pos = end;
        }
        if pos != bytes.len() {
            return Err(format_err(format!(
                "string: {} trailing byte(s) after {} element(s)",
                bytes.len() - pos,
                count
            )));
        }
        Ok(out)
    }

    fn wrap(values: Vec<Self>) -> TensorData {
        TensorData::String(values)
    }

    fn view(data: &TensorData) -> Option<&[Self]> {
        match data {
            TensorData::String(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}
