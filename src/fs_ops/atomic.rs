//! Atomic replace helper.
//! - Unix: `rename(2)` over the destination; the path always names a complete file.
//! - Windows: the destination is removed first when present, which opens a short
//!   window where the path is empty. The caller is told which variant ran.
//! - The destination directory is fsynced afterwards (best-effort, Unix).

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// How the destination was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    /// Single atomic rename; the old content was never absent.
    Atomic,
    /// The old destination had to be deleted before the rename.
    AfterRemove,
}

pub fn replace_atomically(src: &Path, dst: &Path) -> Result<Replaced> {
    #[allow(unused_mut)]
    let mut how = Replaced::Atomic;

    #[cfg(windows)]
    if dst.exists() {
        match fs::remove_file(dst) {
            Ok(()) => how = Replaced::AfterRemove,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("remove existing destination before rename: {}", dst.display())
                });
            }
        }
    }

    fs::rename(src, dst)
        .with_context(|| format!("atomic rename '{}' -> '{}'", src.display(), dst.display()))?;

    #[cfg(unix)]
    if let Some(parent) = dst.parent() {
        // A failed directory fsync does not undo a completed rename.
        let _ = super::util::fsync_dir(parent);
    }

    Ok(how)
}
