//! checkpoint/writer: накопление фрагментов и запись файла чекпоинта.
//!
//! Политика:
//! - create(): <path>.tmp под эксклюзивной блокировкой (через TableBuilder);
//! - save/add_slice/add: проверки имени, слайса, длины буфера, формы/dtype; значения
//!   упаковываются (и сжимаются) сразу, фрагмент уходит в pending с очередным seq;
//! - расхождение формы/dtype отравляет сессию: tmp удаляется, дальнейшие вызовы
//!   и finish() возвращают ошибку;
//! - finish(): pending по возрастанию ключа -> TableBuilder -> rename на место.
//!   Повторный save того же (name, slice) заменяет значение.

use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::key::{check_name, encode_key};
use super::record::FragmentHeader;
use super::slice_set::SliceSet;
use crate::codec::{compress_payload, dispatch_dtype, Element, TensorData};
use crate::config::CkptConfig;
use crate::error::validation;
use crate::metrics::{record_file_finished, record_fragment_saved};
use crate::shape::TensorShape;
use crate::slice::TensorSlice;
use crate::table::TableBuilder;
use crate::tensor::Tensor;

/// Итог finish().
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub tensors: usize,
    pub fragments: usize,
    pub bytes: u64,
}

pub struct CheckpointWriter {
    path: PathBuf,
    cfg: CkptConfig,
    builder: Option<TableBuilder>,
    // key -> готовое value записи
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
    // name -> фрагменты сессии (loc = ключ записи)
    tensors: HashMap<String, SliceSet<Vec<u8>>>,
    next_seq: u64,
    poisoned: Option<String>,
}

impl CheckpointWriter {
    /// Writer с конфигурацией из ENV.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_config(path, CkptConfig::from_env())
    }

    pub fn create_with_config(path: impl AsRef<Path>, cfg: CkptConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let builder = TableBuilder::create(&path, cfg.fsync)?;
        debug!("checkpoint writer: {} ({})", path.display(), cfg);
        Ok(Self {
            path,
            cfg,
            builder: Some(builder),
            pending: BTreeMap::new(),
            tensors: HashMap::new(),
            next_seq: 1,
            poisoned: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CkptConfig {
        &self.cfg
    }

    /// Число фрагментов, ожидающих finish().
    pub fn pending_fragments(&self) -> usize {
        self.pending.len()
    }

    fn ensure_usable(&self) -> Result<()> {
        if let Some(reason) = &self.poisoned {
            return Err(anyhow!(
                "checkpoint writer for {} is poisoned by an earlier error: {}",
                self.path.display(),
                reason
            ));
        }
        if self.builder.is_none() {
            return Err(anyhow!("checkpoint writer for {} is closed", self.path.display()));
        }
        Ok(())
    }

    fn poison(&mut self, err: &anyhow::Error) {
        self.poisoned = Some(format!("{:#}", err));
        if let Some(b) = self.builder.take() {
            b.abandon();
        }
        self.pending.clear();
    }

    /// Сохранить `values` как слайс `slice` (по умолчанию весь тензор) тензора `name`
    /// логической формы `shape`.
    pub fn save<T: Element>(
        &mut self,
        name: &str,
        shape: &TensorShape,
        slice: Option<&TensorSlice>,
        values: &[T],
    ) -> Result<()> {
        self.ensure_usable()?;
        check_name(name)?;

        let slice = match slice {
            Some(s) => {
                s.validate(shape)?;
                s.canonicalize(shape)
            }
            None => TensorSlice::full(shape.rank()),
        };
        let need = slice.num_elements(shape);
        if values.len() as u64 != need {
            return Err(validation(format!(
                "tensor '{}': slice '{}' of {} needs {} element(s), got {}",
                name,
                slice,
                shape,
                need,
                values.len()
            )));
        }

        let key = encode_key(name, &slice, shape);
        if let Some(set) = self.tensors.get(name) {
            if let Err(e) = set.check_compatible(shape, T::DTYPE) {
                self.poison(&e);
                return Err(e);
            }
            if self.cfg.strict_overlap {
                if let Some(f) = set
                    .fragments()
                    .iter()
                    .find(|f| f.loc != key && f.slice.intersect(&slice).is_some())
                {
                    return Err(validation(format!(
                        "tensor '{}': slice '{}' overlaps already saved slice '{}'",
                        name, slice, f.slice
                    )));
                }
            }
        }

        let mut raw = Vec::new();
        T::pack(values, &mut raw)?;
        let raw_len = raw.len() as u64;
        let (codec, stored) = compress_payload(raw, &self.cfg)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        let header = FragmentHeader {
            dtype: T::DTYPE,
            codec,
            seq,
            shape: shape.clone(),
            slice: slice.clone(),
            elem_count: need,
            raw_len,
            stored_len: stored.len() as u64,
        };
        let mut value = Vec::with_capacity(header.encoded_len() + stored.len());
        header.encode_into(&mut value);
        value.extend_from_slice(&stored);

        let set = self
            .tensors
            .entry(name.to_string())
            .or_insert_with(|| SliceSet::new(name, shape.clone(), T::DTYPE));
        set.register(slice, seq, key.clone())?;
        if self.pending.insert(key, value).is_some() {
            debug!("checkpoint writer: '{}' slice resaved (seq {})", name, seq);
        }
        record_fragment_saved();
        Ok(())
    }

    /// Динамический вариант save(): тип берётся из данных.
    pub fn add_slice(
        &mut self,
        name: &str,
        shape: &TensorShape,
        slice: Option<&TensorSlice>,
        data: &TensorData,
    ) -> Result<()> {
        dispatch_dtype!(data.dtype(), T => {
            let values: &[T] = T::view(data).unwrap_or_default();
            self.save::<T>(name, shape, slice, values)
        })
    }

    /// Сохранить тензор целиком.
    pub fn add(&mut self, name: &str, tensor: &Tensor) -> Result<()> {
        self.add_slice(name, tensor.shape(), None, tensor.data())
    }

    /// Записать все pending-фрагменты и атомарно опубликовать файл.
    pub fn finish(mut self) -> Result<WriteSummary> {
        self.ensure_usable()?;
        let mut builder = self
            .builder
            .take()
            .ok_or_else(|| anyhow!("checkpoint writer for {} is closed", self.path.display()))?;

        let pending = std::mem::take(&mut self.pending);
        let fragments = pending.len();
        for (key, value) in &pending {
            builder.add(key, value)?;
        }
        let bytes = builder.finish()?;
        record_file_finished(bytes);

        let summary = WriteSummary {
            path: self.path.clone(),
            tensors: self.tensors.len(),
            fragments,
            bytes,
        };
        info!(
            "checkpoint written: {} ({} tensors, {} fragments, {} B)",
            summary.path.display(),
            summary.tensors,
            summary.fragments,
            summary.bytes
        );
        Ok(summary)
    }
}

impl Drop for CheckpointWriter {
    fn drop(&mut self) {
        if self.builder.is_some() {
            debug!(
                "checkpoint writer: {} dropped without finish ({} pending fragment(s) discarded)",
                self.path.display(),
                self.pending.len()
            );
        }
    }
}
