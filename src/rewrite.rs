//! Rewrite-in-place engine.
//!
//! Each file goes through copy -> hash -> swap -> hash:
//!
//! ```text
//! Untouched -> TempWritten -> Verified -> (OriginalDeleted) -> Renamed -> Done
//! ```
//!
//! Only the ends of that chain are persisted: the `<file>.rewrite` temp says "a run
//! was in progress" and `<file>.rewrite.done` says "finished". A temp without a marker
//! is never resumed; it is deleted and the file starts over.
//!
//! On Unix the swap is a single `rename(2)` over the original, so `OriginalDeleted` is
//! never visited and the path always names complete content. Windows has to delete
//! the original first; that short window is logged.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::audit::Tag;
use crate::classify::{ExclusionRules, is_internal_name};
use crate::errors::MigrateError;
use crate::fs_ops::{Replaced, copy_preserving, replace_atomically};
use crate::hash::FileHasher;
use crate::walk::{SymlinkPolicy, TreeWalker};

pub const TEMP_SUFFIX: &str = ".rewrite";
pub const MARKER_SUFFIX: &str = ".rewrite.done";
const MARKER_CONTENT: &[u8] = b"ok\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RewriteState {
    Untouched,
    TempWritten,
    Verified,
    OriginalDeleted,
    Renamed,
    Done,
}

/// Which comparison failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStage {
    AfterCopy,
    AfterRename,
}

impl fmt::Display for VerifyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyStage::AfterCopy => f.write_str("after copy"),
            VerifyStage::AfterRename => f.write_str("after rename"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("cannot remove stale temp {}: {source}", .path.display())]
    StaleTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copy to {} failed: {detail}", .path.display())]
    Copy { path: PathBuf, detail: String },

    #[error("{op} failed for {}: {source}", .path.display())]
    Hash {
        path: PathBuf,
        op: &'static str,
        state: RewriteState,
        #[source]
        source: io::Error,
    },

    #[error("hash mismatch {stage} for {}", .path.display())]
    Integrity {
        path: PathBuf,
        stage: VerifyStage,
        state: RewriteState,
    },

    #[error("swapping temp into {} failed: {detail}", .path.display())]
    Swap {
        path: PathBuf,
        detail: String,
        state: RewriteState,
    },

    #[error("cannot write marker {}: {source}", .path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RewriteError {
    /// Last state the file reached before the failure.
    pub fn last_state(&self) -> RewriteState {
        match self {
            RewriteError::StaleTemp { .. } | RewriteError::Copy { .. } => RewriteState::Untouched,
            RewriteError::Hash { state, .. }
            | RewriteError::Integrity { state, .. }
            | RewriteError::Swap { state, .. } => *state,
            RewriteError::Marker { .. } => RewriteState::Renamed,
        }
    }

    /// True when the original may already have been replaced by unverified content.
    pub fn needs_inspection(&self) -> bool {
        match self {
            RewriteError::Marker { .. } => false,
            other => other.last_state() >= RewriteState::OriginalDeleted,
        }
    }
}

/// `<path>.rewrite`
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

/// `<path>.rewrite.done`
pub fn marker_path(path: &Path) -> PathBuf {
    with_suffix(path, MARKER_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// True for temp and marker files produced by the engine.
pub fn is_rewrite_artifact(path: &Path) -> bool {
    path.file_name()
        .map(|n| {
            let n = n.to_string_lossy();
            n.ends_with(TEMP_SUFFIX) || n.ends_with(MARKER_SUFFIX)
        })
        .unwrap_or(false)
}

pub struct RewriteEngine<'a> {
    hasher: &'a dyn FileHasher,
    dry_run: bool,
}

impl<'a> RewriteEngine<'a> {
    pub fn new(hasher: &'a dyn FileHasher) -> Self {
        Self {
            hasher,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Rewrite one file in place. `Ok(Done)` for a finished (or previously finished)
    /// file, `Ok(Untouched)` for a dry run.
    pub fn rewrite(&self, path: &Path) -> Result<RewriteState, RewriteError> {
        let temp = temp_path(path);
        let marker = marker_path(path);

        if marker.exists() {
            info!(tag = %Tag::Skip, path = %path.display(), "Already rewritten");
            return Ok(RewriteState::Done);
        }

        if fs::symlink_metadata(&temp).is_ok() {
            fs::remove_file(&temp).map_err(|source| RewriteError::StaleTemp {
                path: temp.clone(),
                source,
            })?;
            info!(tag = %Tag::Cleanup, path = %temp.display(), "Removed stale temp file");
        }

        if self.dry_run {
            info!(tag = %Tag::DryRun, path = %path.display(), "Would rewrite");
            return Ok(RewriteState::Untouched);
        }

        copy_preserving(path, &temp).map_err(|e| RewriteError::Copy {
            path: temp.clone(),
            detail: format!("{e:#}"),
        })?;
        let mut state = RewriteState::TempWritten;

        let original_hash = self
            .hash(path, "hash original", state)
            .inspect_err(|_| discard_temp(&temp))?;
        let temp_hash = self
            .hash(&temp, "hash temp copy", state)
            .inspect_err(|_| discard_temp(&temp))?;
        if original_hash != temp_hash {
            discard_temp(&temp);
            error!(tag = %Tag::Error, path = %path.display(), "Hash mismatch after copy; original left untouched");
            return Err(RewriteError::Integrity {
                path: path.to_path_buf(),
                stage: VerifyStage::AfterCopy,
                state,
            });
        }
        state = RewriteState::Verified;

        match replace_atomically(&temp, path) {
            Ok(Replaced::Atomic) => {}
            Ok(Replaced::AfterRemove) => {
                debug!(path = %path.display(), "original removed before rename");
            }
            Err(e) => {
                // If the original is gone the temp is the only copy left.
                if path.exists() {
                    discard_temp(&temp);
                } else {
                    state = RewriteState::OriginalDeleted;
                    error!(
                        tag = %Tag::Error,
                        path = %path.display(),
                        temp = %temp.display(),
                        "Original removed but temp not renamed; content survives only in the temp file"
                    );
                }
                return Err(RewriteError::Swap {
                    path: path.to_path_buf(),
                    detail: format!("{e:#}"),
                    state,
                });
            }
        }
        state = RewriteState::Renamed;

        let final_hash = self.hash(path, "hash rewritten file", state)?;
        if final_hash != original_hash {
            error!(tag = %Tag::Error, path = %path.display(), "Hash mismatch after rename; inspect this file manually");
            return Err(RewriteError::Integrity {
                path: path.to_path_buf(),
                stage: VerifyStage::AfterRename,
                state,
            });
        }

        write_marker(&marker).map_err(|source| RewriteError::Marker {
            path: marker.clone(),
            source,
        })?;
        info!(tag = %Tag::Ok, path = %path.display(), "Rewritten");
        Ok(RewriteState::Done)
    }

    fn hash(&self, path: &Path, op: &'static str, state: RewriteState) -> Result<String, RewriteError> {
        self.hasher.hash(path).map_err(|source| RewriteError::Hash {
            path: path.to_path_buf(),
            op,
            state,
            source,
        })
    }
}

fn discard_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => debug!(path = %temp.display(), "temp removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(tag = %Tag::Warning, path = %temp.display(), error = %e, "Could not remove temp file"),
    }
}

fn write_marker(marker: &Path) -> io::Result<()> {
    let mut f = File::create(marker)?;
    f.write_all(MARKER_CONTENT)?;
    f.sync_all()
}

/// Outcome of the post-run marker sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
    /// Temp or marker files still present after the sweep.
    pub residuals: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.residuals.is_empty()
    }
}

/// Delete every done-marker under `root`, then re-scan for leftover artifacts. The
/// first `report_limit` residuals are logged by name, the rest as a count.
pub fn cleanup_markers(root: &Path, report_limit: usize) -> CleanupReport {
    let mut report = CleanupReport::default();
    info!(tag = %Tag::Cleanup, root = %root.display(), "Removing rewrite markers");

    for marker in artifacts(root).filter(|p| has_suffix(p, MARKER_SUFFIX)) {
        match fs::remove_file(&marker) {
            Ok(()) => report.removed += 1,
            Err(source) => {
                report.failed += 1;
                let err = MigrateError::Cleanup { path: marker, source };
                warn!(tag = %Tag::Warning, "{err}");
            }
        }
    }
    info!(tag = %Tag::Cleanup, removed = report.removed, failed = report.failed, "Marker cleanup finished");

    report.residuals = artifacts(root).collect();
    if report.residuals.is_empty() {
        info!(tag = %Tag::Ok, root = %root.display(), "No temp or marker files remain");
    } else {
        for p in report.residuals.iter().take(report_limit) {
            warn!(tag = %Tag::Warning, path = %p.display(), "Residual rewrite artifact");
        }
        if report.residuals.len() > report_limit {
            warn!(
                tag = %Tag::Warning,
                more = report.residuals.len() - report_limit,
                "... and more residual artifacts not listed"
            );
        }
    }
    report
}

fn artifacts(root: &Path) -> impl Iterator<Item = PathBuf> {
    let rules = ExclusionRules::none();
    let roots = [root.to_path_buf()];
    TreeWalker::new(&roots, &rules)
        .symlinks(SymlinkPolicy::Skip)
        .files()
        .map(|e| e.path)
        .filter(|p| {
            p.file_name().is_some_and(|n| !is_internal_name(n)) && is_rewrite_artifact(p)
        })
        .collect::<Vec<_>>()
        .into_iter()
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().ends_with(suffix))
}
