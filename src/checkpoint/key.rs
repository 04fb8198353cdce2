//! checkpoint/key: ключ записи в таблице: name || 0x00 || канонический слайс.
//!
//! Байт 0x00 в имени запрещён, поэтому разбор однозначен, а все фрагменты одного
//! тензора лежат в таблице подряд (общий префикс name||0x00).

use anyhow::Result;

use crate::consts::KEY_SEP;
use crate::error::{format_err, validation};
use crate::shape::TensorShape;
use crate::slice::TensorSlice;

/// Имя тензора: непустое, без NUL.
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(validation("tensor name must not be empty"));
    }
    if name.as_bytes().contains(&KEY_SEP) {
        return Err(validation(format!("tensor name {:?} contains a NUL byte", name)));
    }
    Ok(())
}

/// Префикс всех ключей тензора `name`.
pub fn name_prefix(name: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(name.len() + 1);
    k.extend_from_slice(name.as_bytes());
    k.push(KEY_SEP);
    k
}

/// Ключ фрагмента. Слайс канонизируется по форме: "0,2:-" и "-:-" на [2,N] дают один ключ.
pub fn encode_key(name: &str, slice: &TensorSlice, shape: &TensorShape) -> Vec<u8> {
    let mut k = name_prefix(name);
    k.extend_from_slice(slice.canonicalize(shape).to_string().as_bytes());
    k
}

/// Разобрать ключ в (имя, строка слайса).
pub fn decode_key(key: &[u8]) -> Result<(&str, &str)> {
    let sep = key
        .iter()
        .position(|&b| b == KEY_SEP)
        .ok_or_else(|| format_err(format!("key {:?} has no name separator", String::from_utf8_lossy(key))))?;
    let name = std::str::from_utf8(&key[..sep])
        .map_err(|e| format_err(format!("key name is not utf-8: {}", e)))?;
    let slice = std::str::from_utf8(&key[sep + 1..])
        .map_err(|e| format_err(format!("key slice is not utf-8: {}", e)))?;
    if name.is_empty() {
        return Err(format_err("key has an empty tensor name"));
    }
    Ok((name, slice))
}
