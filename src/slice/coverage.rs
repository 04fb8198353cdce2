//! slice/coverage: отслеживание непокрытого остатка запрошенной области.
//!
//! Остаток хранится как набор непересекающихся коробок; cover() вычитает кусок из
//! каждой. Запрос покрыт целиком ровно тогда, когда остаток пуст, поэтому объединение
//! пересечений равно запросу без подсчёта элементов (перекрытия фрагментов не мешают).

use super::TensorSlice;
use crate::shape::TensorShape;

#[derive(Debug, Clone)]
pub struct Coverage {
    shape: TensorShape,
    remaining: Vec<TensorSlice>,
}

impl Coverage {
    pub fn new(request: &TensorSlice, shape: &TensorShape) -> Self {
        let remaining = if request.num_elements(shape) == 0 {
            Vec::new()
        } else {
            vec![request.clone()]
        };
        Self {
            shape: shape.clone(),
            remaining,
        }
    }

    /// Отметить кусок как покрытый.
    pub fn cover(&mut self, piece: &TensorSlice) {
        if self.remaining.is_empty() {
            return;
        }
        let shape = &self.shape;
        self.remaining = self
            .remaining
            .iter()
            .flat_map(|r| r.subtract(piece, shape))
            .collect();
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Непокрытые коробки (для диагностики).
    pub fn uncovered(&self) -> &[TensorSlice] {
        &self.remaining
    }

    pub fn uncovered_elements(&self) -> u64 {
        self.remaining
            .iter()
            .map(|r| r.num_elements(&self.shape))
            .sum()
    }
}
