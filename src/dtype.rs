//! dtype: закрытый набор типов элементов тензора.
//!
//! Коды на диске стабильны (u8) и совпадают с классической нумерацией DT_*:
//! 1=float, 2=double, 3=int32, 4=uint8, 5=int16, 6=int8, 7=string, 8=complex64,
//! 9=int64, 10=bool, 11=qint8, 13=qint32.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float,
    Double,
    Int32,
    UInt8,
    Int16,
    Int8,
    String,
    Complex64,
    Int64,
    Bool,
    QInt8,
    QInt32,
}

impl DataType {
    pub const ALL: [DataType; 12] = [
        DataType::Float,
        DataType::Double,
        DataType::Int32,
        DataType::UInt8,
        DataType::Int16,
        DataType::Int8,
        DataType::String,
        DataType::Complex64,
        DataType::Int64,
        DataType::Bool,
        DataType::QInt8,
        DataType::QInt32,
    ];

    /// Код для записи на диск.
    pub fn to_u8(self) -> u8 {
        match self {
            DataType::Float => 1,
            DataType::Double => 2,
            DataType::Int32 => 3,
            DataType::UInt8 => 4,
            DataType::Int16 => 5,
            DataType::Int8 => 6,
            DataType::String => 7,
            DataType::Complex64 => 8,
            DataType::Int64 => 9,
            DataType::Bool => 10,
            DataType::QInt8 => 11,
            DataType::QInt32 => 13,
        }
    }

    /// Разбор кода с диска. Неизвестные коды -> None.
    pub fn from_u8(code: u8) -> Option<Self> {
        DataType::ALL.iter().copied().find(|t| t.to_u8() == code)
    }

    /// Ширина элемента в байтах; None для строк (переменная длина).
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Int8 | DataType::UInt8 | DataType::QInt8 => Some(1),
            DataType::Int16 => Some(2),
            DataType::Int32 | DataType::Float | DataType::QInt32 => Some(4),
            DataType::Int64 | DataType::Double | DataType::Complex64 => Some(8),
            DataType::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Int32 => "int32",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::Int8 => "int8",
            DataType::String => "string",
            DataType::Complex64 => "complex64",
            DataType::Int64 => "int64",
            DataType::Bool => "bool",
            DataType::QInt8 => "qint8",
            DataType::QInt32 => "qint32",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Квантованный int8 (хранится как i8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct QInt8(pub i8);

/// Квантованный int32 (хранится как i32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct QInt32(pub i32);

/// Комплексное число из двух f32 (re, im).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Complex64 {
    pub re: f32,
    pub im: f32,
}

impl Complex64 {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

impl fmt::Display for QInt8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QInt32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Complex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}{:+}i)", self.re, self.im)
    }
}
