//! table/format: кодирование заголовка, индекса и футера файла таблицы.
//!
//! Формат (LE):
//!   Header  (16 B): [magic8="QCKTABLE"][version u32=1][flags u32]
//!   Entries       : [klen u32][vlen u32][key][value][crc32c(key||value) u32] ...
//!   Index         : на запись [klen u32][key][entry_off u64][vlen u32], ключи строго по возрастанию
//!   Footer  (40 B): [index_off u64][index_len u64][count u64][crc32c(index) u32][0 u32][magic8="QCKFOOTR"]

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    ENTRY_CRC_SIZE, ENTRY_HDR_SIZE, FOOTER_MAGIC, FOOTER_SIZE, TABLE_HDR_SIZE, TABLE_MAGIC,
    TABLE_VERSION,
};
use crate::error::format_err;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub index_off: u64,
    pub index_len: u64,
    pub count: u64,
    pub index_crc: u32,
}

/// Запись индекса (в памяти ридера).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub entry_off: u64,
    pub vlen: u32,
}

impl IndexEntry {
    /// Смещение value внутри файла.
    #[inline]
    pub fn value_off(&self) -> u64 {
        self.entry_off + ENTRY_HDR_SIZE as u64 + self.key.len() as u64
    }

    /// Полный размер записи в файле (заголовок + key + value + crc).
    #[inline]
    pub fn entry_len(&self) -> u64 {
        (ENTRY_HDR_SIZE + self.key.len() + ENTRY_CRC_SIZE) as u64 + self.vlen as u64
    }
}

pub fn encode_header(flags: u32) -> [u8; TABLE_HDR_SIZE] {
    let mut h = [0u8; TABLE_HDR_SIZE];
    h[0..8].copy_from_slice(TABLE_MAGIC);
    LittleEndian::write_u32(&mut h[8..12], TABLE_VERSION);
    LittleEndian::write_u32(&mut h[12..16], flags);
    h
}

/// Проверить заголовок; возвращает flags.
pub fn decode_header(buf: &[u8]) -> Result<u32> {
    if buf.len() < TABLE_HDR_SIZE {
        return Err(format_err(format!("table header truncated ({} B)", buf.len())));
    }
    if &buf[0..8] != TABLE_MAGIC {
        return Err(format_err(format!(
            "bad table magic (expected {:?}, got {:?})",
            TABLE_MAGIC,
            &buf[0..8]
        )));
    }
    let version = LittleEndian::read_u32(&buf[8..12]);
    if version != TABLE_VERSION {
        return Err(format_err(format!(
            "unsupported table version {} (expected {})",
            version, TABLE_VERSION
        )));
    }
    Ok(LittleEndian::read_u32(&buf[12..16]))
}

pub fn encode_footer(f: &Footer) -> [u8; FOOTER_SIZE] {
    let mut b = [0u8; FOOTER_SIZE];
    LittleEndian::write_u64(&mut b[0..8], f.index_off);
    LittleEndian::write_u64(&mut b[8..16], f.index_len);
    LittleEndian::write_u64(&mut b[16..24], f.count);
    LittleEndian::write_u32(&mut b[24..28], f.index_crc);
    // b[28..32]: reserved (0)
    b[32..40].copy_from_slice(FOOTER_MAGIC);
    b
}

pub fn decode_footer(buf: &[u8]) -> Result<Footer> {
    if buf.len() != FOOTER_SIZE {
        return Err(format_err(format!("footer must be {} B, got {}", FOOTER_SIZE, buf.len())));
    }
    if &buf[32..40] != FOOTER_MAGIC {
        return Err(format_err("bad footer magic (file truncated or not a checkpoint)"));
    }
    Ok(Footer {
        index_off: LittleEndian::read_u64(&buf[0..8]),
        index_len: LittleEndian::read_u64(&buf[8..16]),
        count: LittleEndian::read_u64(&buf[16..24]),
        index_crc: LittleEndian::read_u32(&buf[24..28]),
    })
}

/// Заголовок записи: [klen u32][vlen u32].
pub fn encode_entry_header(klen: u32, vlen: u32) -> [u8; ENTRY_HDR_SIZE] {
    let mut b = [0u8; ENTRY_HDR_SIZE];
    LittleEndian::write_u32(&mut b[0..4], klen);
    LittleEndian::write_u32(&mut b[4..8], vlen);
    b
}

/// CRC32C по key||value.
#[inline]
pub fn entry_crc(key: &[u8], value: &[u8]) -> u32 {
    crc32c::crc32c_append(crc32c::crc32c(key), value)
}

pub fn encode_index_entry(out: &mut Vec<u8>, key: &[u8], entry_off: u64, vlen: u32) {
    let mut b4 = [0u8; 4];
    let mut b8 = [0u8; 8];
    LittleEndian::write_u32(&mut b4, key.len() as u32);
    out.extend_from_slice(&b4);
    out.extend_from_slice(key);
    LittleEndian::write_u64(&mut b8, entry_off);
    out.extend_from_slice(&b8);
    LittleEndian::write_u32(&mut b4, vlen);
    out.extend_from_slice(&b4);
}

/// Разобрать индекс из `count` записей. Требуется ровно израсходовать буфер.
pub fn decode_index(buf: &[u8], count: u64) -> Result<Vec<IndexEntry>> {
    let mut out = Vec::with_capacity((count as usize).min(buf.len() / 16 + 1));
    let mut pos = 0usize;
    for i in 0..count {
        if pos + 4 > buf.len() {
            return Err(format_err(format!("index truncated at entry {}", i)));
        }
        let klen = LittleEndian::read_u32(&buf[pos..pos + 4]) as usize;
        pos += 4;
        if pos + klen + 12 > buf.len() {
            return Err(format_err(format!("index entry {} runs past index end", i)));
        }
        let key = buf[pos..pos + klen].to_vec();
        pos += klen;
        let entry_off = LittleEndian::read_u64(&buf[pos..pos + 8]);
        let vlen = LittleEndian::read_u32(&buf[pos + 8..pos + 12]);
        pos += 12;
        out.push(IndexEntry { key, entry_off, vlen });
    }
    if pos != buf.len() {
        return Err(format_err(format!(
            "index has {} trailing byte(s) after {} entries",
            buf.len() - pos,
            count
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_footer_roundtrip() {
        let h = encode_header(0);
        assert_eq!(decode_header(&h).unwrap(), 0);

        let mut bad = h;
        bad[0] = b'X';
        assert!(decode_header(&bad).is_err());

        let f = Footer {
            index_off: 16,
            index_len: 40,
            count: 2,
            index_crc: 0xDEADBEEF,
        };
        let enc = encode_footer(&f);
        assert_eq!(decode_footer(&enc).unwrap(), f);
        assert!(decode_footer(&enc[..39]).is_err());
    }

    #[test]
    fn index_roundtrip_and_trailing_bytes() {
        let mut buf = Vec::new();
        encode_index_entry(&mut buf, b"alpha", 16, 7);
        encode_index_entry(&mut buf, b"beta", 40, 0);
        let idx = decode_index(&buf, 2).unwrap();
        assert_eq!(idx[0].key, b"alpha");
        assert_eq!(idx[0].value_off(), 16 + 8 + 5);
        assert_eq!(idx[1].entry_len(), 8 + 4 + 4);

        assert!(decode_index(&buf, 3).is_err());
        assert!(decode_index(&buf, 1).is_err());
    }
}
