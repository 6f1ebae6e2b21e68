//! Empty-directory pruning for move mode.
//!
//! `prune_empty_ancestors` climbs from a moved file's directory towards its source
//! root, removing directories that became empty, and stops at the first non-empty
//! one. The root itself is never removed.
//! `prune_empty_tree` is the bottom-up sweep used before a run to clear directories
//! that were already empty.
//!
//! Failures are cleanup warnings only. Races with parallel workers (someone else
//! removed it first, or dropped a file in) simply end the climb.

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::audit::Tag;

/// Remove now-empty ancestors of `file` up to, but excluding, `root`.
/// Returns how many directories were removed.
pub fn prune_empty_ancestors(file: &Path, root: &Path) -> usize {
    let mut removed = 0;
    let mut current = file.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match remove_if_empty(dir) {
            Ok(true) => {
                info!(tag = %Tag::Cleanup, path = %dir.display(), "Removed empty folder");
                removed += 1;
            }
            Ok(false) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %dir.display(), "folder already gone");
                break;
            }
            Err(e) => {
                warn!(tag = %Tag::Warning, path = %dir.display(), error = %e, "Could not remove empty folder");
                break;
            }
        }
        current = dir.parent();
    }
    removed
}

/// Remove every empty directory strictly below `root`, deepest first, so chains of
/// empty directories collapse in one pass. Returns how many were removed.
pub fn prune_empty_tree(root: &Path) -> usize {
    info!(root = %root.display(), "Scanning for pre-existing empty folders");
    let mut removed = 0;
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
    {
        match remove_if_empty(entry.path()) {
            Ok(true) => {
                info!(tag = %Tag::Cleanup, path = %entry.path().display(), "Removed pre-existing empty folder");
                removed += 1;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(tag = %Tag::Warning, path = %entry.path().display(), error = %e, "Could not remove empty folder")
            }
        }
    }
    removed
}

/// `Ok(false)` when the directory still has children (including when a concurrent
/// writer filled it between the check and the removal).
fn remove_if_empty(dir: &Path) -> io::Result<bool> {
    if fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    match fs::remove_dir(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => Ok(false),
        Err(e) => Err(e),
    }
}
