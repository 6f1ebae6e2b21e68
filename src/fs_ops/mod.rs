//! Filesystem operations: modularized.
//!
//! Low-level building blocks shared by the transfer executor and the rewrite engine:
//! streaming copy, staged copy + rename, metadata preservation, atomic replace,
//! free-space selection, empty-directory pruning and the run lock.

mod atomic;
mod copy;
pub mod helpers;
mod io_copy;
mod lock;
pub mod metadata;
mod prune;
pub mod space;
mod util;

pub use atomic::{Replaced, replace_atomically};
pub use copy::{copy_preserving, stage_and_rename};
pub use helpers::{io_error_with_help, io_error_with_help_io};
pub use lock::{DirLock, try_acquire_dir_lock};
pub use prune::{prune_empty_ancestors, prune_empty_tree};
pub use util::{is_staging_temp, staging_temp_path};
