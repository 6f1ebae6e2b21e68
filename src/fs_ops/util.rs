use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::classify::INTERNAL_PREFIX;

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden staging name in `dst_dir`: `.media_migrate.<pid>.<nanos>.<seq>.tmp`.
/// The sequence keeps parallel workers from colliding inside one process.
pub fn staging_temp_path(dst_dir: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    dst_dir.join(format!("{INTERNAL_PREFIX}{pid}.{nanos}.{seq}.tmp"))
}

/// True for names produced by [`staging_temp_path`].
pub fn is_staging_temp(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with(INTERNAL_PREFIX) && name.ends_with(".tmp")
}

#[cfg(unix)]
pub(super) fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}
