//! tensor: форма + типизированные данные (вход save_* и результат read_tensor).

use anyhow::Result;

use crate::codec::{Element, TensorData};
use crate::dtype::DataType;
use crate::error::validation;
use crate::shape::TensorShape;

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: TensorShape,
    data: TensorData,
}

impl Tensor {
    /// Число элементов данных обязано совпасть с объёмом формы.
    pub fn new(shape: TensorShape, data: TensorData) -> Result<Self> {
        if data.len() as u64 != shape.num_elements() {
            return Err(validation(format!(
                "tensor of shape {} needs {} element(s), got {}",
                shape,
                shape.num_elements(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn from_vec<T: Element>(shape: impl Into<TensorShape>, values: Vec<T>) -> Result<Self> {
        Self::new(shape.into(), T::wrap(values))
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Типизированный срез значений; None, если T не совпадает с dtype.
    pub fn values<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.data)
    }
}
