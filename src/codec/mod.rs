//! codec: упаковка элементов тензора в байты и обратно.
//!
//! - Element: типизированный pack/unpack для каждого варианта DataType (scalar.rs);
//! - TensorData: tagged union поверх Vec<T> (динамический путь: save entry points, CLI);
//! - compress.rs: per-record компрессия (none|zstd).
//!
//! Раскладка на диске: фиксированной ширины: little-endian, bool: 1 байт,
//! complex64: два f32 подряд (re, im), string: [len u32][utf-8 bytes].

use anyhow::Result;
use serde::Serialize;

use crate::dtype::{Complex64, DataType, QInt32, QInt8};

pub mod compress;
pub mod scalar;

pub use compress::{compress_payload, decompress_payload};

/// Тип элемента, который умеет упаковываться в байтовый буфер фрагмента.
pub trait Element: Clone + Default + Send + Sync + 'static {
    const DTYPE: DataType;

    /// Дописать упакованные значения в `out`.
    fn pack(values: &[Self], out: &mut Vec<u8>) -> Result<()>;

    /// Распаковать ровно `count` значений; лишние/недостающие байты: Format error.
    fn unpack(bytes: &[u8], count: usize) -> Result<Vec<Self>>;

    fn wrap(values: Vec<Self>) -> TensorData;

    fn view(data: &TensorData) -> Option<&[Self]>;
}

/// Типизированные данные тензора (один Vec на вариант DataType).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum TensorData {
    Float(Vec<f32>),
    Double(Vec<f64>),
    Int32(Vec<i32>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    Int8(Vec<i8>),
    String(Vec<String>),
    Complex64(Vec<Complex64>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    QInt8(Vec<QInt8>),
    QInt32(Vec<QInt32>),
}

/// Выполнить `$body` с локальным алиасом типа `$T`, соответствующим `$dtype`.
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::DataType::Float => {
                type $T = f32;
                $body
            }
            $crate::dtype::DataType::Double => {
                type $T = f64;
                $body
            }
            $crate::dtype::DataType::Int32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DataType::UInt8 => {
                type $T = u8;
                $body
            }
            $crate::dtype::DataType::Int16 => {
                type $T = i16;
                $body
            }
            $crate::dtype::DataType::Int8 => {
                type $T = i8;
                $body
            }
            $crate::dtype::DataType::String => {
                type $T = String;
                $body
            }
            $crate::dtype::DataType::Complex64 => {
                type $T = $crate::dtype::Complex64;
                $body
            }
            $crate::dtype::DataType::Int64 => {
                type $T = i64;
                $body
            }
            $crate::dtype::DataType::Bool => {
                type $T = bool;
                $body
            }
            $crate::dtype::DataType::QInt8 => {
                type $T = $crate::dtype::QInt8;
                $body
            }
            $crate::dtype::DataType::QInt32 => {
                type $T = $crate::dtype::QInt32;
                $body
            }
        }
    };
}
pub(crate) use dispatch_dtype;

impl TensorData {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::Float(_) => DataType::Float,
            TensorData::Double(_) => DataType::Double,
            TensorData::Int32(_) => DataType::Int32,
            TensorData::UInt8(_) => DataType::UInt8,
            TensorData::Int16(_) => DataType::Int16,
            TensorData::Int8(_) => DataType::Int8,
            TensorData::String(_) => DataType::String,
            TensorData::Complex64(_) => DataType::Complex64,
            TensorData::Int64(_) => DataType::Int64,
            TensorData::Bool(_) => DataType::Bool,
            TensorData::QInt8(_) => DataType::QInt8,
            TensorData::QInt32(_) => DataType::QInt32,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_dtype!(self.dtype(), T => T::view(self).map(|v| v.len()).unwrap_or(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Буфер из `n` значений по умолчанию заданного типа.
    pub fn zeros(dtype: DataType, n: usize) -> TensorData {
        dispatch_dtype!(dtype, T => T::wrap(vec![T::default(); n]))
    }

    pub fn unpack(dtype: DataType, bytes: &[u8], count: usize) -> Result<TensorData> {
        dispatch_dtype!(dtype, T => Ok(T::wrap(T::unpack(bytes, count)?)))
    }

    /// Строковое представление элементов (для dump в CLI).
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            TensorData::Float(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Double(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Int32(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::UInt8(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Int16(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Int8(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::String(v) => v.iter().map(|x| format!("{:?}", x)).collect(),
            TensorData::Complex64(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Int64(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Bool(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::QInt8(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::QInt32(v) => v.iter().map(|x| x.to_string()).collect(),
        }
    }
}
