//! table: отсортированная key→value таблица в одном файле (backing store чекпоинта).
//!
//! - builder.rs: TableBuilder: потоковая запись (ключи по возрастанию), tmp+rename;
//! - format.rs : заголовок/индекс/футер;
//! - этот файл : Table: открытие (mmap или RAM), точечный поиск, обход, range-чтения.
//!
//! Table после open() неизменяем: все методы берут &self, тип Send + Sync.

use anyhow::{anyhow, Context, Result};
use log::debug;
use memmap2::{Mmap, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub mod builder;
pub mod format;

pub use builder::TableBuilder;
pub use format::IndexEntry;

use crate::consts::{ENTRY_CRC_SIZE, ENTRY_HDR_SIZE, FOOTER_SIZE, TABLE_HDR_SIZE};
use crate::error::format_err;
use crate::metrics::record_crc_failure;
use format::{decode_footer, decode_header, decode_index, entry_crc};
use byteorder::{ByteOrder, LittleEndian};

/// Представление содержимого файла: mmap или копия в RAM.
enum Backing {
    Mmap(Mmap),
    Ram(Vec<u8>),
}

impl Backing {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mmap(m) => &m[..],
            Backing::Ram(v) => v.as_slice(),
        }
    }
}

pub struct Table {
    path: PathBuf,
    backing: Backing,
    index: Vec<IndexEntry>,
    verify_crc: bool,
}

impl Table {
    /// Открыть файл таблицы и проверить структуру (заголовок, футер, CRC индекса,
    /// порядок ключей, границы записей).
    pub fn open(path: &Path, use_mmap: bool, verify_crc: bool) -> Result<Self> {
        let f = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open table {}", path.display()))?;
        let flen = f
            .metadata()
            .with_context(|| format!("stat table {}", path.display()))?
            .len();
        if flen < (TABLE_HDR_SIZE + FOOTER_SIZE) as u64 {
            return Err(format_err(format!(
                "{}: file too small for a table ({} B)",
                path.display(),
                flen
            )));
        }

        let backing = if use_mmap {
            let mmap = unsafe {
                MmapOptions::new()
                    .map(&f)
                    .map_err(|e| anyhow!("table mmap {}: {}", path.display(), e))?
            };
            Backing::Mmap(mmap)
        } else {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read table {}", path.display()))?;
            Backing::Ram(bytes)
        };

        let index = Self::load_index(path, backing.bytes())?;
        debug!(
            "table open: {} ({} entries, {} B, {})",
            path.display(),
            index.len(),
            flen,
            if use_mmap { "mmap" } else { "ram" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            backing,
            index,
            verify_crc,
        })
    }

    fn load_index(path: &Path, bytes: &[u8]) -> Result<Vec<IndexEntry>> {
        let ctx = |msg: String| format_err(format!("{}: {}", path.display(), msg));

        decode_header(&bytes[..TABLE_HDR_SIZE])?;
        let flen = bytes.len() as u64;
        let footer = decode_footer(&bytes[bytes.len() - FOOTER_SIZE..])?;

        let index_end = flen - FOOTER_SIZE as u64;
        if footer.index_off < TABLE_HDR_SIZE as u64
            || footer.index_off.checked_add(footer.index_len) != Some(index_end)
        {
            return Err(ctx(format!(
                "index range {}+{} does not end at footer ({})",
                footer.index_off, footer.index_len, index_end
            )));
        }
        let index_bytes = &bytes[footer.index_off as usize..index_end as usize];
        let crc = crc32c::crc32c(index_bytes);
        if crc != footer.index_crc {
            record_crc_failure();
            return Err(ctx(format!(
                "index crc mismatch (stored {:08x}, computed {:08x})",
                footer.index_crc, crc
            )));
        }

        let index = decode_index(index_bytes, footer.count)?;
        let mut expect_off = TABLE_HDR_SIZE as u64;
        for (i, e) in index.iter().enumerate() {
            if i > 0 && index[i - 1].key >= e.key {
                return Err(ctx(format!("index keys out of order at entry {}", i)));
            }
            // Записи идут подряд, без дыр, и заканчиваются ровно перед индексом.
            if e.entry_off != expect_off {
                return Err(ctx(format!(
                    "entry {} at offset {}, expected {}",
                    i, e.entry_off, expect_off
                )));
            }
            let end = e.entry_off + e.entry_len();
            if end > footer.index_off {
                return Err(ctx(format!("entry {} runs into the index", i)));
            }
            let off = e.entry_off as usize;
            let klen = LittleEndian::read_u32(&bytes[off..off + 4]) as usize;
            let vlen = LittleEndian::read_u32(&bytes[off + 4..off + 8]);
            let key_at = off + ENTRY_HDR_SIZE;
            if klen != e.key.len() || vlen != e.vlen || bytes[key_at..key_at + klen] != e.key[..] {
                return Err(ctx(format!("entry {} header disagrees with index", i)));
            }
            expect_off = end;
        }
        if expect_off != footer.index_off {
            return Err(ctx(format!(
                "{} unindexed byte(s) before the index",
                footer.index_off - expect_off
            )));
        }
        Ok(index)
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.backing.bytes()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Количество записей.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn entry(&self, i: usize) -> &IndexEntry {
        &self.index[i]
    }

    /// Обход всех записей по возрастанию ключа: (номер записи, ключ).
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        self.index.iter().enumerate().map(|(i, e)| (i, e.key.as_slice()))
    }

    /// Обход записей, ключи которых начинаются с `prefix`.
    pub fn range_prefix<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (usize, &'a [u8])> + 'a {
        let start = self.index.partition_point(|e| e.key.as_slice() < prefix);
        self.index[start..]
            .iter()
            .enumerate()
            .take_while(move |(_, e)| e.key.starts_with(prefix))
            .map(move |(j, e)| (start + j, e.key.as_slice()))
    }

    /// Номер записи с ключом `key` (бинарный поиск).
    pub fn find(&self, key: &[u8]) -> Option<usize> {
        self.index.binary_search_by(|e| e.key.as_slice().cmp(key)).ok()
    }

    /// Точечный поиск значения.
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        match self.find(key) {
            Some(i) => self.value(i).map(Some),
            None => Ok(None),
        }
    }

    /// Значение записи i; при verify_crc сверяется CRC32C записи.
    pub fn value(&self, i: usize) -> Result<&[u8]> {
        if self.verify_crc && !self.verify_entry(i) {
            record_crc_failure();
            return Err(format_err(format!(
                "{}: crc mismatch in entry {} (key {:?})",
                self.path.display(),
                i,
                String::from_utf8_lossy(&self.index[i].key)
            )));
        }
        Ok(self.value_unchecked(i))
    }

    /// Значение без проверки CRC (границы проверены при open()).
    pub fn value_unchecked(&self, i: usize) -> &[u8] {
        let e = &self.index[i];
        let off = e.value_off() as usize;
        &self.bytes()[off..off + e.vlen as usize]
    }

    /// Сверить CRC32C записи i.
    pub fn verify_entry(&self, i: usize) -> bool {
        let e = &self.index[i];
        let v = self.value_unchecked(i);
        let crc_at = e.value_off() as usize + e.vlen as usize;
        let stored = LittleEndian::read_u32(&self.bytes()[crc_at..crc_at + ENTRY_CRC_SIZE]);
        stored == entry_crc(&e.key, v)
    }

    /// Произвольный диапазон байтов файла.
    pub fn read_range(&self, off: u64, len: u64) -> Result<&[u8]> {
        let end = off
            .checked_add(len)
            .filter(|&end| end <= self.file_len())
            .ok_or_else(|| {
                format_err(format!(
                    "{}: range {}+{} is outside the file ({} B)",
                    self.path.display(),
                    off,
                    len,
                    self.file_len()
                ))
            })?;
        Ok(&self.bytes()[off as usize..end as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_kind, ErrorKind};
    use std::fs;

    fn tmp_file(name: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("qck-table-{}-{}-{}", name, std::process::id(), t));
        fs::create_dir_all(&dir).unwrap();
        dir.join("t.qck")
    }

    fn build(path: &Path, items: &[(&[u8], &[u8])]) {
        let mut b = TableBuilder::create(path, false).unwrap();
        for (k, v) in items {
            b.add(k, v).unwrap();
        }
        b.finish().unwrap();
    }

    #[test]
    fn build_open_get_iter() {
        let path = tmp_file("basic");
        build(&path, &[(b"a\0-", b"one"), (b"a\x000,1", b""), (b"b\0-", b"three")]);

        for mmap in [true, false] {
            let t = Table::open(&path, mmap, true).unwrap();
            assert_eq!(t.len(), 3);
            assert_eq!(t.get(b"b\0-").unwrap(), Some(&b"three"[..]));
            assert_eq!(t.get(b"a\x000,1").unwrap(), Some(&b""[..]));
            assert_eq!(t.get(b"zz").unwrap(), None);

            let keys: Vec<&[u8]> = t.iter().map(|(_, k)| k).collect();
            assert_eq!(keys, vec![&b"a\0-"[..], &b"a\x000,1"[..], &b"b\0-"[..]]);

            let a: Vec<usize> = t.range_prefix(b"a\0").map(|(i, _)| i).collect();
            assert_eq!(a, vec![0, 1]);
            assert_eq!(t.range_prefix(b"c").count(), 0);

            let e = t.entry(2);
            assert_eq!(t.read_range(e.value_off(), 5).unwrap(), b"three");
            assert!(t.read_range(t.file_len() - 1, 2).is_err());
        }
        assert!(!crate::util::tmp_path_for(&path).exists());
    }

    #[test]
    fn keys_must_increase() {
        let path = tmp_file("order");
        let mut b = TableBuilder::create(&path, false).unwrap();
        b.add(b"b", b"1").unwrap();
        let e = b.add(b"a", b"2").unwrap_err();
        assert_eq!(error_kind(&e), ErrorKind::Validation);
        assert!(b.add(b"b", b"2").is_err());
        b.abandon();
        assert!(!crate::util::tmp_path_for(&path).exists());
        assert!(!path.exists());
    }

    #[test]
    fn second_builder_on_same_path_fails_fast() {
        let path = tmp_file("lock");
        let b1 = TableBuilder::create(&path, false).unwrap();
        assert!(TableBuilder::create(&path, false).is_err());
        drop(b1);
    }

    #[test]
    fn corruption_is_detected() {
        let path = tmp_file("corrupt");
        build(&path, &[(b"k", b"value-bytes")]);

        // Порча байта значения: структура цела, CRC записи: нет.
        let mut bytes = fs::read(&path).unwrap();
        let t = Table::open(&path, false, true).unwrap();
        let voff = t.entry(0).value_off() as usize;
        drop(t);
        bytes[voff] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let t = Table::open(&path, true, true).unwrap();
        assert!(!t.verify_entry(0));
        let e = t.value(0).unwrap_err();
        assert_eq!(error_kind(&e), ErrorKind::Format);
        let t = Table::open(&path, true, false).unwrap();
        assert!(t.value(0).is_ok());

        // Обрезанный файл не открывается.
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        let e = Table::open(&path, true, true).err().unwrap();
        assert_eq!(error_kind(&e), ErrorKind::Format);
    }
}
