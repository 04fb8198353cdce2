//! Общие константы форматов (table file, записи фрагментов, codecs).

// -------- Table file --------
// Header (16 байт): [magic8][ver u32][flags u32]
pub const TABLE_MAGIC: &[u8; 8] = b"QCKTABLE";
pub const TABLE_VERSION: u32 = 1;
pub const TABLE_HDR_SIZE: usize = 16;

// Entry: [klen u32][vlen u32][key][value][crc32c u32 по key||value]
pub const ENTRY_HDR_SIZE: usize = 8;
pub const ENTRY_CRC_SIZE: usize = 4;

// Footer (40 байт):
// [index_off u64][index_len u64][count u64][index_crc32c u32][reserved u32][magic8]
pub const FOOTER_MAGIC: &[u8; 8] = b"QCKFOOTR";
pub const FOOTER_SIZE: usize = 40;

// Суффикс временного файла, в который пишет writer до rename.
pub const TMP_SUFFIX: &str = "tmp";

// -------- Fragment record (value в таблице) --------
pub const RECORD_VERSION: u8 = 1;

// Разделитель имени и слайса в ключе. Имя тензора не может содержать NUL.
pub const KEY_SEP: u8 = 0x00;

// -------- Codecs (per record) --------
pub const CODEC_NONE: u8 = 0;
pub const CODEC_ZSTD: u8 = 1;

// Длина строки в codec (u32 LE префикс).
pub const STRING_LEN_PREFIX: usize = 4;
