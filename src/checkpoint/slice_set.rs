//! checkpoint/slice_set: все сохранённые фрагменты одного тензора.
//!
//! SliceSet<L> параметризован «адресом» фрагмента: ридер хранит DataLoc (где лежат
//! байты в таблице), writer: ключ pending-записи, doctor: (). Форма и dtype общие для всех
//! фрагментов; перекрытия допускаются, покрытие проверяется только при чтении.

use anyhow::Result;

use crate::dtype::DataType;
use crate::error::mismatch;
use crate::shape::TensorShape;
use crate::slice::{Coverage, TensorSlice};

/// Расположение payload фрагмента внутри таблицы.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLoc {
    /// Номер записи в таблице.
    pub entry: usize,
    /// Смещение payload внутри value записи.
    pub data_off: usize,
    pub stored_len: u64,
    pub raw_len: u64,
    pub elem_count: u64,
    pub codec: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFragment<L = DataLoc> {
    pub slice: TensorSlice,
    pub seq: u64,
    pub loc: L,
}

#[derive(Debug, Clone)]
pub struct SliceSet<L = DataLoc> {
    name: String,
    shape: TensorShape,
    dtype: DataType,
    fragments: Vec<StoredFragment<L>>,
}

impl<L> SliceSet<L> {
    pub fn new(name: &str, shape: TensorShape, dtype: DataType) -> Self {
        Self {
            name: name.to_string(),
            shape,
            dtype,
            fragments: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Фрагменты в порядке регистрации (после finalize()).
    pub fn fragments(&self) -> &[StoredFragment<L>] {
        &self.fragments
    }

    /// Форма и dtype нового фрагмента должны совпасть с уже известными.
    pub fn check_compatible(&self, shape: &TensorShape, dtype: DataType) -> Result<()> {
        if !self.shape.is_same_size(shape) {
            return Err(mismatch(
                &self.name,
                format!("shape {} differs from previously seen {}", shape, self.shape),
            ));
        }
        if self.dtype != dtype {
            return Err(mismatch(
                &self.name,
                format!("dtype {} differs from previously seen {}", dtype, self.dtype),
            ));
        }
        Ok(())
    }

    /// Добавить фрагмент; слайс обязан быть корректным для формы тензора.
    pub fn register(&mut self, slice: TensorSlice, seq: u64, loc: L) -> Result<()> {
        slice.validate(&self.shape)?;
        self.fragments.push(StoredFragment { slice, seq, loc });
        Ok(())
    }

    /// Упорядочить фрагменты по seq (порядок наложения при копировании).
    pub fn finalize(&mut self) {
        self.fragments.sort_by_key(|f| f.seq);
    }

    /// Покрытие запроса объединением пересечений (только метаданные).
    pub fn coverage(&self, request: &TensorSlice) -> Coverage {
        let mut cov = Coverage::new(request, &self.shape);
        for f in &self.fragments {
            if cov.is_complete() {
                break;
            }
            if let Some(inter) = f.slice.intersect(request) {
                cov.cover(&inter);
            }
        }
        cov
    }

    pub fn covers(&self, request: &TensorSlice) -> bool {
        self.coverage(request).is_complete()
    }

    /// Фрагменты с непустым пересечением с запросом, в порядке регистрации.
    pub fn overlapping<'a>(
        &'a self,
        request: &'a TensorSlice,
    ) -> impl Iterator<Item = (&'a StoredFragment<L>, TensorSlice)> + 'a {
        self.fragments
            .iter()
            .filter_map(move |f| f.slice.intersect(request).map(|inter| (f, inter)))
    }

    /// Суммарный объём сохранённых элементов (с учётом перекрытий: с повторами).
    pub fn stored_elements(&self) -> u64 {
        self.fragments
            .iter()
            .map(|f| f.slice.num_elements(&self.shape))
            .sum()
    }
}
