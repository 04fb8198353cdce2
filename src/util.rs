//! util: общие мелкие хелперы файловых операций.

use std::ffi::OsString;
#[cfg(unix)]
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::consts::TMP_SUFFIX;

/// fsync родительского каталога (best-effort на не-unix).
#[cfg(unix)]
pub fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
pub fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// <path>.tmp: куда пишет writer до атомарного rename.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_os_string();
    s.push(".");
    s.push(TMP_SUFFIX);
    PathBuf::from(s)
}
