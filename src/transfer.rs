//! Transfer executor.
//!
//! One call to [`TransferExecutor::transfer`] takes a single file from "discovered" to
//! exactly one [`TransferOutcome`]:
//!
//! 1. duplicate check against the pre-run [`ExistingIndex`]
//! 2. destination choice in priority order through the [`DestinationSelector`]
//! 3. staged copy (plus metadata) to `<dest>/<relative path>`
//! 4. size verification of source and target against the pre-copy size; a mismatch
//!    rolls the target back and the next destination is tried
//! 5. in move mode, removal of the source and pruning of emptied ancestors
//!
//! Nothing here returns an error to the caller: every failure is logged with its
//! path and folded into `FailedIO`, so one bad file never stops the batch.

use anyhow::{Result, bail};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::audit::Tag;
use crate::errors::MigrateError;
use crate::fs_ops::space::DestinationSelector;
use crate::fs_ops::{prune_empty_ancestors, stage_and_rename};
use crate::index::{ExistingIndex, Presence};
use crate::walk::WalkEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    Move,
}

impl TransferMode {
    fn tag(self) -> Tag {
        match self {
            TransferMode::Copy => Tag::Copy,
            TransferMode::Move => Tag::Move,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOutcome {
    Copied,
    Moved,
    SkippedDuplicate,
    SkippedExcluded,
    SkippedNoSpace,
    FailedIO,
}

impl TransferOutcome {
    pub const ALL: [TransferOutcome; 6] = [
        TransferOutcome::Copied,
        TransferOutcome::Moved,
        TransferOutcome::SkippedDuplicate,
        TransferOutcome::SkippedExcluded,
        TransferOutcome::SkippedNoSpace,
        TransferOutcome::FailedIO,
    ];

    pub fn is_failure(self) -> bool {
        self == TransferOutcome::FailedIO
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferOutcome::Copied => "copied",
            TransferOutcome::Moved => "moved",
            TransferOutcome::SkippedDuplicate => "skipped (duplicate)",
            TransferOutcome::SkippedExcluded => "skipped (excluded)",
            TransferOutcome::SkippedNoSpace => "skipped (no space)",
            TransferOutcome::FailedIO => "failed",
        };
        f.write_str(s)
    }
}

/// A source file ready for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub root: PathBuf,
    pub relative: PathBuf,
    pub size: u64,
}

impl FileRecord {
    /// Stat a walked entry. Symlinks resolve to their target's size; entries that are
    /// not regular files after resolution yield `Ok(None)`.
    pub fn from_entry(entry: WalkEntry) -> io::Result<Option<Self>> {
        let meta = fs::metadata(&entry.path)?;
        if !meta.is_file() {
            return Ok(None);
        }
        let relative = entry.relative().to_path_buf();
        Ok(Some(Self {
            path: entry.path,
            root: entry.root,
            relative,
            size: meta.len(),
        }))
    }
}

pub struct TransferExecutor<'a> {
    index: &'a ExistingIndex,
    selector: DestinationSelector<'a>,
    destinations: &'a [PathBuf],
    mode: TransferMode,
    preserve_metadata: bool,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        index: &'a ExistingIndex,
        selector: DestinationSelector<'a>,
        destinations: &'a [PathBuf],
        mode: TransferMode,
    ) -> Self {
        Self {
            index,
            selector,
            destinations,
            mode,
            preserve_metadata: true,
        }
    }

    pub fn preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    pub fn transfer(&self, file: &FileRecord) -> TransferOutcome {
        match self.index.lookup(&file.relative, file.size) {
            Presence::Exact => {
                info!(tag = %Tag::Skip, path = %file.path.display(), "Already exists on a destination");
                return TransferOutcome::SkippedDuplicate;
            }
            Presence::CaseCollision { existing } => {
                warn!(
                    tag = %Tag::Warning,
                    path = %file.path.display(),
                    existing = %existing,
                    "Case collision with an existing file of the same size; skipping"
                );
                return TransferOutcome::SkippedDuplicate;
            }
            Presence::Absent => {}
        }

        let mut remaining = self.destinations;
        let mut failed_attempt = false;
        while let Some(i) = self.selector.select_index(remaining, file.size) {
            let dest_root = &remaining[i];
            let target = dest_root.join(&file.relative);
            match self.attempt(file, &target) {
                Ok(outcome) => return outcome,
                Err(e) => {
                    error!(
                        tag = %Tag::Error,
                        src = %file.path.display(),
                        dest = %target.display(),
                        error = %format!("{e:#}"),
                        "Transfer to destination failed"
                    );
                    failed_attempt = true;
                }
            }
            remaining = &remaining[i + 1..];
        }

        if failed_attempt {
            return TransferOutcome::FailedIO;
        }
        let capacity = MigrateError::Capacity {
            path: file.path.clone(),
            required: file.size,
        };
        warn!(tag = %Tag::Skip, path = %file.path.display(), headroom = self.selector.headroom(), "{capacity}");
        TransferOutcome::SkippedNoSpace
    }

    /// Copy to one destination and verify. On success in move mode the source is
    /// removed; errors after a verified copy (source delete) are reported but the
    /// outcome stands as failed so the operator sees both copies.
    fn attempt(&self, file: &FileRecord, target: &Path) -> Result<TransferOutcome> {
        if target.exists() {
            debug!(dest = %target.display(), "replacing different-size file at destination");
        }
        stage_and_rename(&file.path, target, self.preserve_metadata)?;
        verify_sizes(&file.path, target, file.size)?;

        let tag = self.mode.tag();
        match self.mode {
            TransferMode::Copy => {
                info!(tag = %tag, src = %file.path.display(), dest = %target.display(), size = file.size, "Copied");
                Ok(TransferOutcome::Copied)
            }
            TransferMode::Move => {
                if let Err(e) = fs::remove_file(&file.path) {
                    error!(
                        tag = %Tag::Error,
                        src = %file.path.display(),
                        dest = %target.display(),
                        error = %e,
                        "Copied but could not remove source"
                    );
                    return Ok(TransferOutcome::FailedIO);
                }
                info!(tag = %tag, src = %file.path.display(), dest = %target.display(), size = file.size, "Moved");
                prune_empty_ancestors(&file.path, &file.root);
                Ok(TransferOutcome::Moved)
            }
        }
    }
}

/// Re-stat `src` and `dst` and require both to be `expected` bytes. On mismatch the
/// target is deleted so no short copy is ever left under the final name.
fn verify_sizes(src: &Path, dst: &Path, expected: u64) -> Result<()> {
    let dst_len = fs::metadata(dst).map(|m| m.len());
    let src_len = fs::metadata(src).map(|m| m.len());
    match (src_len, dst_len) {
        (Ok(s), Ok(d)) if s == expected && d == expected => Ok(()),
        (s, d) => {
            let detail = format!(
                "size mismatch: expected {expected}, source {}, destination {}",
                describe(&s),
                describe(&d)
            );
            match fs::remove_file(dst) {
                Ok(()) => info!(tag = %Tag::Cleanup, path = %dst.display(), "Removed unverified copy"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(tag = %Tag::Warning, path = %dst.display(), error = %e, "Could not remove unverified copy")
                }
            }
            bail!(MigrateError::Integrity {
                path: dst.to_path_buf(),
                detail,
            })
        }
    }
}

fn describe(len: &io::Result<u64>) -> String {
    match len {
        Ok(n) => n.to_string(),
        Err(e) => format!("unreadable ({e})"),
    }
}
