#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod util;

// Метаданные тензора
pub mod shape;
pub mod dtype;
pub mod tensor;

// Слайсы и кодек элементов
pub mod slice;  // src/slice/{mod,coverage,spec}.rs
pub mod codec;  // src/codec/{mod,scalar,compress}.rs

// Файл таблицы и чекпоинты поверх него
pub mod table;      // src/table/{mod,builder,format}.rs
pub mod checkpoint; // src/checkpoint/{mod,key,record,slice_set,copy,writer,reader,save,doctor}.rs

// Удобные реэкспорты
pub use checkpoint::{
    doctor, save_tensor_slices, save_tensors, CheckpointReader, CheckpointWriter, DoctorReport,
    SliceSet, WriteSummary,
};
pub use codec::{Element, TensorData};
pub use config::{CkptBuilder, CkptConfig};
pub use dtype::{Complex64, DataType, QInt32, QInt8};
pub use error::{error_kind, CkptError, ErrorKind};
pub use shape::TensorShape;
pub use slice::{parse_shape_and_slice, Extent, TensorSlice};
pub use tensor::Tensor;
