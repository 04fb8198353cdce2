//! checkpoint/reader: индекс фрагментов и чтение областей тензоров.
//!
//! open():
//! - таблица открывается (mmap или RAM), каждая запись разбирается: ключ (имя, слайс)
//!   и заголовок фрагмента; слайс ключа обязан совпасть со слайсом заголовка;
//! - фрагменты группируются по имени в SliceSet и упорядочиваются по seq.
//!
//! copy_slice_data():
//! - покрытие запроса считается только по метаданным; неполное -> Ok(false), буфер
//!   вызывающего не трогается;
//! - затем все пересекающиеся фрагменты загружаются (CRC, распаковка) и только после
//!   этого копируются в буфер, в порядке seq: последний сохранённый побеждает.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

use super::copy::copy_region;
use super::key::decode_key;
use super::record::FragmentHeader;
use super::slice_set::{DataLoc, SliceSet, StoredFragment};
use crate::codec::{decompress_payload, dispatch_dtype, Element, TensorData};
use crate::config::CkptConfig;
use crate::dtype::DataType;
use crate::error::{format_err, mismatch, validation, CkptError};
use crate::metrics::{
    record_copy_call, record_copy_coverage_miss, record_copy_hit, record_copy_not_found,
    record_file_opened, record_fragment_read,
};
use crate::shape::TensorShape;
use crate::slice::TensorSlice;
use crate::table::Table;
use crate::tensor::Tensor;

pub struct CheckpointReader {
    table: Table,
    cfg: CkptConfig,
    tensors: BTreeMap<String, SliceSet>,
}

impl CheckpointReader {
    /// Открыть чекпоинт с конфигурацией из ENV.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, CkptConfig::from_env())
    }

    pub fn open_with_config(path: impl AsRef<Path>, cfg: CkptConfig) -> Result<Self> {
        let path = path.as_ref();
        let table = Table::open(path, cfg.mmap, cfg.verify_crc)?;

        let mut tensors: BTreeMap<String, SliceSet> = BTreeMap::new();
        for (i, key) in table.iter() {
            let (name, slice_str) = decode_key(key)?;
            let value = table.value_unchecked(i);
            let (hdr, data_off) = FragmentHeader::decode(value)
                .with_context(|| format!("{}: record '{}' [{}]", path.display(), name, slice_str))?;

            let key_slice: TensorSlice = slice_str
                .parse()
                .map_err(|e| format_err(format!("record '{}': bad key slice: {:#}", name, e)))?;
            if key_slice != hdr.slice {
                return Err(format_err(format!(
                    "record '{}': key slice '{}' disagrees with header slice '{}'",
                    name, key_slice, hdr.slice
                )));
            }

            let loc = DataLoc {
                entry: i,
                data_off,
                stored_len: hdr.stored_len,
                raw_len: hdr.raw_len,
                elem_count: hdr.elem_count,
                codec: hdr.codec,
            };
            let set = tensors
                .entry(name.to_string())
                .or_insert_with(|| SliceSet::new(name, hdr.shape.clone(), hdr.dtype));
            set.check_compatible(&hdr.shape, hdr.dtype)
                .map_err(|e| format_err(format!("{}: {:#}", path.display(), e)))?;
            set.register(hdr.slice, hdr.seq, loc)
                .map_err(|e| format_err(format!("{}: {:#}", path.display(), e)))?;
        }
        for set in tensors.values_mut() {
            set.finalize();
        }

        record_file_opened(table.len() as u64);
        info!(
            "checkpoint open: {} ({} tensors, {} fragments)",
            path.display(),
            tensors.len(),
            table.len()
        );
        Ok(Self { table, cfg, tensors })
    }

    pub fn path(&self) -> &Path {
        self.table.path()
    }

    pub fn config(&self) -> &CkptConfig {
        &self.cfg
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Число тензоров в индексе.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Имена тензоров по возрастанию.
    pub fn tensor_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tensors.keys().map(|s| s.as_str())
    }

    pub fn slice_set(&self, name: &str) -> Option<&SliceSet> {
        self.tensors.get(name)
    }

    /// Форма и dtype тензора, если хоть один его фрагмент сохранён.
    pub fn has_tensor(&self, name: &str) -> Option<(TensorShape, DataType)> {
        self.tensors
            .get(name)
            .map(|set| (set.shape().clone(), set.dtype()))
    }

    /// Скопировать область `slice` тензора `name` в `out` (row-major по слайсу).
    ///
    /// Ok(false): тензора нет или область покрыта сохранёнными фрагментами не полностью
    /// (в обоих случаях `out` не изменяется). Некорректный слайс или длина `out`:
    /// Validation error, несовпадение T с сохранённым dtype: ShapeOrTypeMismatch.
    pub fn copy_slice_data<T: Element>(
        &self,
        name: &str,
        slice: &TensorSlice,
        out: &mut [T],
    ) -> Result<bool> {
        record_copy_call();
        let set = match self.tensors.get(name) {
            Some(set) => set,
            None => {
                record_copy_not_found();
                debug!("copy_slice_data: '{}' not found", name);
                return Ok(false);
            }
        };
        let shape = set.shape();
        slice.validate(shape)?;
        let need = slice.num_elements(shape);
        if out.len() as u64 != need {
            return Err(validation(format!(
                "tensor '{}': slice '{}' of {} needs a buffer of {} element(s), got {}",
                name,
                slice,
                shape,
                need,
                out.len()
            )));
        }
        if T::DTYPE != set.dtype() {
            return Err(mismatch(
                name,
                format!("requested {}, stored {}", T::DTYPE, set.dtype()),
            ));
        }

        let cov = set.coverage(slice);
        if !cov.is_complete() {
            record_copy_coverage_miss();
            debug!(
                "copy_slice_data: '{}' [{}] not covered ({} element(s) missing)",
                name,
                slice,
                cov.uncovered_elements()
            );
            return Ok(false);
        }

        let mut loaded = Vec::new();
        for (frag, region) in set.overlapping(slice) {
            let values = self
                .load_fragment::<T>(frag)
                .with_context(|| format!("tensor '{}' fragment '{}'", name, frag.slice))?;
            loaded.push((frag, region, values));
        }
        for (frag, region, values) in &loaded {
            copy_region(shape, region, &frag.slice, values, slice, out)?;
        }

        record_copy_hit(need);
        Ok(true)
    }

    fn load_fragment<T: Element>(&self, frag: &StoredFragment) -> Result<Vec<T>> {
        let loc = &frag.loc;
        let value = self.table.value(loc.entry)?;
        let stored = value
            .get(loc.data_off..)
            .ok_or_else(|| format_err("fragment payload offset past the record end"))?;
        let raw = decompress_payload(loc.codec, stored, loc.raw_len)?;
        record_fragment_read(loc.stored_len);
        let count = usize::try_from(loc.elem_count)
            .map_err(|_| format_err(format!("{} elements do not fit in memory", loc.elem_count)))?;
        T::unpack(&raw, count)
    }

    /// Прочитать область в новый буфер (тип по сохранённому dtype).
    /// Ok(None): тензора нет или область не покрыта.
    pub fn read_slice(&self, name: &str, slice: &TensorSlice) -> Result<Option<TensorData>> {
        let set = match self.tensors.get(name) {
            Some(set) => set,
            None => return Ok(None),
        };
        slice.validate(set.shape())?;
        let n = usize::try_from(slice.num_elements(set.shape()))
            .map_err(|_| validation(format!("slice '{}' is too large to read at once", slice)))?;
        dispatch_dtype!(set.dtype(), T => {
            let mut buf = vec![T::default(); n];
            if self.copy_slice_data::<T>(name, slice, &mut buf)? {
                Ok(Some(T::wrap(buf)))
            } else {
                Ok(None)
            }
        })
    }

    /// Тензор целиком; Ok(None), если его нет или сохранён не полностью.
    pub fn read_tensor(&self, name: &str) -> Result<Option<Tensor>> {
        let shape = match self.tensors.get(name) {
            Some(set) => set.shape().clone(),
            None => return Ok(None),
        };
        let full = TensorSlice::full(shape.rank());
        match self.read_slice(name, &full)? {
            Some(data) => Ok(Some(Tensor::new(shape, data)?)),
            None => Ok(None),
        }
    }

    /// Как read_tensor(), но отсутствие: ошибка NotFound.
    pub fn require_tensor(&self, name: &str) -> Result<Tensor> {
        self.read_tensor(name)?.ok_or_else(|| {
            CkptError::NotFound(format!("'{}' in {}", name, self.path().display())).into()
        })
    }
}
