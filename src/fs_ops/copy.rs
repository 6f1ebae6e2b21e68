//! Copy primitives used by transfers and rewrites.
//! - `stage_and_rename`: copy into a hidden staging temp next to the target, carry the
//!   metadata over, then rename into place. A crash never leaves a half-written file
//!   under the final name, only a staging temp that the next index build reclaims.
//! - `copy_preserving`: copy to a fresh path (must not exist) with every attribute we
//!   can carry (xattrs/ACLs, ownership, mode, times).
//!
//! Both remove their partial output on failure.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

use crate::audit::Tag;
use crate::errors::MigrateError;

use super::atomic::replace_atomically;
use super::helpers::io_error_with_help;
use super::{io_copy, metadata, util};

/// Copy `src` to `dest` via a staging temp in `dest`'s directory. Returns bytes copied.
/// The parent directory is created when missing; concurrent creators are fine.
pub fn stage_and_rename(src: &Path, dest: &Path, preserve: bool) -> Result<u64> {
    let dest_dir = dest
        .parent()
        .ok_or_else(|| anyhow!("destination has no parent: {}", dest.display()))?;

    fs::create_dir_all(dest_dir)
        .map_err(io_error_with_help("create destination directory", dest_dir))?;

    let tmp = util::staging_temp_path(dest_dir);
    let result = (|| -> Result<u64> {
        let copied = io_copy::copy_streaming(src, &tmp)
            .map_err(io_error_with_help("copy to staging file", &tmp))?;
        if preserve {
            let meta = fs::metadata(src).map_err(io_error_with_help("stat source", src))?;
            metadata::preserve_all(src, &tmp, &meta);
        }
        replace_atomically(&tmp, dest).with_context(|| {
            format!("move staging file into place at '{}'", dest.display())
        })?;
        Ok(copied)
    })();

    if result.is_err() {
        discard_staging(&tmp);
    }
    result
}

/// Remove a staging temp after a failed copy. A failure other than "already gone" is
/// logged as a WARNING and returned; the index build reclaims the temp later.
fn discard_staging(tmp: &Path) -> Option<MigrateError> {
    match fs::remove_file(tmp) {
        Ok(()) => None,
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(source) => {
            let err = MigrateError::Cleanup { path: tmp.to_path_buf(), source };
            warn!(tag = %Tag::Warning, path = %tmp.display(), "{err}");
            Some(err)
        }
    }
}

/// Copy `src` to `dst` (which must not exist), preserving every attribute we can.
pub fn copy_preserving(src: &Path, dst: &Path) -> Result<u64> {
    let meta = fs::metadata(src).map_err(io_error_with_help("stat source", src))?;
    let copied = match io_copy::copy_streaming(src, dst) {
        Ok(c) => c,
        Err(e) => {
            // AlreadyExists means the path belongs to someone else; leave it.
            if e.kind() != io::ErrorKind::AlreadyExists {
                let _ = fs::remove_file(dst);
            }
            return Err(io_error_with_help("copy", dst)(e));
        }
    };
    metadata::preserve_all(src, dst, &meta);
    Ok(copied)
}
