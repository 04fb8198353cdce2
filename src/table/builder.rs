//! table/builder: потоковая запись файла таблицы.
//!
//! Политика:
//! - Пишем в <path>.tmp под эксклюзивной advisory-блокировкой (fs2): второй writer
//!   на тот же путь получает ошибку сразу, а не портит файл.
//! - Ключи подаются строго по возрастанию (add проверяет).
//! - finish(): индекс + футер, flush, fsync (по конфигу), rename tmp -> path, fsync каталога.
//! - Drop без finish(): tmp удаляется (best-effort).

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::format::{encode_entry_header, encode_footer, encode_header, encode_index_entry, entry_crc, Footer};
use crate::consts::{ENTRY_CRC_SIZE, ENTRY_HDR_SIZE, TABLE_HDR_SIZE};
use crate::error::validation;
use crate::util::{fsync_dir, tmp_path_for};

pub struct TableBuilder {
    path: PathBuf,
    tmp: PathBuf,
    out: Option<BufWriter<File>>,
    pos: u64,
    index: Vec<u8>,
    count: u64,
    last_key: Option<Vec<u8>>,
    fsync: bool,
}

impl TableBuilder {
    /// Создать builder для конечного пути `path`.
    pub fn create(path: &Path, fsync: bool) -> Result<Self> {
        let tmp = tmp_path_for(path);
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&tmp)
            .with_context(|| format!("open table tmp {}", tmp.display()))?;
        f.try_lock_exclusive().map_err(|e| {
            anyhow!(
                "checkpoint {} is being written by another writer ({}): {}",
                path.display(),
                tmp.display(),
                e
            )
        })?;
        f.set_len(0)
            .with_context(|| format!("truncate {}", tmp.display()))?;

        let mut out = BufWriter::new(f);
        out.write_all(&encode_header(0))
            .with_context(|| format!("write table header {}", tmp.display()))?;

        debug!("table builder: started {}", tmp.display());
        Ok(Self {
            path: path.to_path_buf(),
            tmp,
            out: Some(out),
            pos: TABLE_HDR_SIZE as u64,
            index: Vec::new(),
            count: 0,
            last_key: None,
            fsync,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Добавить запись. Ключ обязан быть строго больше предыдущего.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(prev) = &self.last_key {
            if key <= prev.as_slice() {
                return Err(validation(format!(
                    "table keys must be strictly increasing (got {:?} after {:?})",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(prev)
                )));
            }
        }
        let klen = u32::try_from(key.len())
            .map_err(|_| validation(format!("key of {} B is too long", key.len())))?;
        let vlen = u32::try_from(value.len())
            .map_err(|_| validation(format!("value of {} B is too long", value.len())))?;

        let out = self
            .out
            .as_mut()
            .ok_or_else(|| anyhow!("table builder for {} already finished", self.path.display()))?;

        let entry_off = self.pos;
        out.write_all(&encode_entry_header(klen, vlen))?;
        out.write_all(key)?;
        out.write_all(value)?;
        out.write_all(&entry_crc(key, value).to_le_bytes())?;

        self.pos += (ENTRY_HDR_SIZE + key.len() + value.len() + ENTRY_CRC_SIZE) as u64;
        encode_index_entry(&mut self.index, key, entry_off, vlen);
        self.count += 1;
        self.last_key = Some(key.to_vec());
        Ok(())
    }

    /// Дописать индекс и футер, сделать файл durable и переименовать на место.
    /// Возвращает итоговый размер файла.
    pub fn finish(mut self) -> Result<u64> {
        let mut out = self
            .out
            .take()
            .ok_or_else(|| anyhow!("table builder for {} already finished", self.path.display()))?;

        let footer = Footer {
            index_off: self.pos,
            index_len: self.index.len() as u64,
            count: self.count,
            index_crc: crc32c::crc32c(&self.index),
        };
        out.write_all(&self.index)?;
        out.write_all(&encode_footer(&footer))?;
        let total = footer.index_off + footer.index_len + crate::consts::FOOTER_SIZE as u64;

        let f = out
            .into_inner()
            .map_err(|e| anyhow!("flush {}: {}", self.tmp.display(), e.error()))?;
        if self.fsync {
            f.sync_all()
                .with_context(|| format!("fsync {}", self.tmp.display()))?;
        }
        drop(f);

        fs::rename(&self.tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", self.tmp.display(), self.path.display()))?;
        if self.fsync {
            if let Err(e) = fsync_dir(&self.path) {
                warn!("table builder: fsync dir of {} failed: {}", self.path.display(), e);
            }
        }

        debug!(
            "table builder: finished {} ({} entries, {} B)",
            self.path.display(),
            self.count,
            total
        );
        Ok(total)
    }

    /// Отказаться от записи и удалить tmp.
    pub fn abandon(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.out.take().is_some() {
            match fs::remove_file(&self.tmp) {
                Ok(()) => debug!("table builder: removed {}", self.tmp.display()),
                Err(e) => warn!("table builder: remove {} failed: {}", self.tmp.display(), e),
            }
        }
    }
}

impl Drop for TableBuilder {
    fn drop(&mut self) {
        // После finish()/abandon() out == None, здесь ничего не делаем.
        self.discard();
    }
}
