//! Batch drivers.
//!
//! A run is: validate, take the run locks, build the existing-file index once,
//! enumerate every group's sources (exclusions and cross-group duplicates are settled
//! here), then dispatch the queue to the transfer executor, sequentially or on a
//! fixed-size rayon pool. Per-file failures only show up as counters; the returned
//! `Err` is reserved for preconditions and interruption.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::audit::Tag;
use crate::classify::{Exclusion, ExclusionRules, is_internal_name};
use crate::config::{Config, validate_rewrite_root};
use crate::errors::MigrateError;
use crate::fs_ops::space::{DestinationSelector, SpaceProbe};
use crate::fs_ops::{DirLock, prune_empty_tree, try_acquire_dir_lock};
use crate::hash::FileHasher;
use crate::index::{ExistingIndex, Signature};
use crate::rewrite::{
    CleanupReport, RewriteEngine, RewriteState, cleanup_markers, is_rewrite_artifact, marker_path,
};
use crate::shutdown;
use crate::transfer::{FileRecord, TransferExecutor, TransferMode, TransferOutcome};
use crate::walk::{SymlinkPolicy, TreeWalker};

/// Per-outcome counters for a transfer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub copied: usize,
    pub moved: usize,
    pub skipped_duplicate: usize,
    pub skipped_excluded: usize,
    pub skipped_no_space: usize,
    pub failed: usize,
}

impl Summary {
    pub fn record(&mut self, outcome: TransferOutcome) {
        *self.slot(outcome) += 1;
    }

    pub fn count(&self, outcome: TransferOutcome) -> usize {
        match outcome {
            TransferOutcome::Copied => self.copied,
            TransferOutcome::Moved => self.moved,
            TransferOutcome::SkippedDuplicate => self.skipped_duplicate,
            TransferOutcome::SkippedExcluded => self.skipped_excluded,
            TransferOutcome::SkippedNoSpace => self.skipped_no_space,
            TransferOutcome::FailedIO => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        TransferOutcome::ALL.iter().map(|o| self.count(*o)).sum()
    }

    fn slot(&mut self, outcome: TransferOutcome) -> &mut usize {
        match outcome {
            TransferOutcome::Copied => &mut self.copied,
            TransferOutcome::Moved => &mut self.moved,
            TransferOutcome::SkippedDuplicate => &mut self.skipped_duplicate,
            TransferOutcome::SkippedExcluded => &mut self.skipped_excluded,
            TransferOutcome::SkippedNoSpace => &mut self.skipped_no_space,
            TransferOutcome::FailedIO => &mut self.failed,
        }
    }

    fn log(&self) {
        info!(
            tag = %Tag::Ok,
            copied = self.copied,
            moved = self.moved,
            skipped_duplicate = self.skipped_duplicate,
            skipped_excluded = self.skipped_excluded,
            skipped_no_space = self.skipped_no_space,
            failed = self.failed,
            "Run summary"
        );
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copied {}, moved {}, duplicates {}, excluded {}, no space {}, failed {}",
            self.copied,
            self.moved,
            self.skipped_duplicate,
            self.skipped_excluded,
            self.skipped_no_space,
            self.failed
        )
    }
}

/// Run-scoped state shared by every transfer: configuration, the pre-run index, the
/// free-space probe and the locks held on the source roots. Dropping it releases
/// the locks.
pub struct RunContext<'a> {
    pub config: &'a Config,
    pub index: ExistingIndex,
    probe: &'a dyn SpaceProbe,
    // held for the run; dropped with the context
    _locks: Vec<DirLock>,
}

impl<'a> RunContext<'a> {
    /// Lock `lock_roots` (unless disabled) and build the index over every destination.
    pub fn open(config: &'a Config, probe: &'a dyn SpaceProbe, lock_roots: &[PathBuf]) -> Result<Self> {
        let locks = if config.disable_locks {
            debug!("run locks disabled");
            Vec::new()
        } else {
            lock_all(lock_roots)?
        };
        let index = ExistingIndex::build(&config.all_destinations());
        Ok(Self {
            config,
            index,
            probe,
            _locks: locks,
        })
    }

    pub fn probe(&self) -> &'a dyn SpaceProbe {
        self.probe
    }
}

fn lock_all(roots: &[PathBuf]) -> Result<Vec<DirLock>> {
    let mut locks = Vec::with_capacity(roots.len());
    for root in roots {
        match try_acquire_dir_lock(root) {
            Ok(Some(lock)) => locks.push(lock),
            Ok(None) => {
                return Err(MigrateError::Precondition(format!(
                    "another run is already working on '{}'",
                    root.display()
                ))
                .into());
            }
            Err(e) => {
                return Err(MigrateError::Precondition(format!(
                    "cannot lock '{}': {e} (use --disable-locks on filesystems without lock support)",
                    root.display()
                ))
                .into());
            }
        }
    }
    Ok(locks)
}

struct Queued {
    group: usize,
    record: FileRecord,
}

/// Copy or move every eligible source file onto its group's destinations.
pub fn run_transfer(config: &Config, mode: TransferMode, probe: &dyn SpaceProbe) -> Result<Summary> {
    config.validate()?;
    let sources = config.all_sources();
    let ctx = RunContext::open(config, probe, &sources)?;

    if mode == TransferMode::Move && config.prune_empty_dirs {
        for src in &sources {
            let removed = prune_empty_tree(src);
            info!(tag = %Tag::Cleanup, root = %src.display(), removed, "Pre-run empty folder sweep done");
        }
    }

    let mut summary = Summary::default();
    let queue = enumerate(&ctx, &mut summary)?;
    info!(queued = queue.len(), "Enumeration complete");

    let executors: Vec<TransferExecutor<'_>> = config
        .groups
        .iter()
        .map(|g| {
            TransferExecutor::new(
                &ctx.index,
                DestinationSelector::new(ctx.probe(), config.headroom_bytes),
                &g.destinations,
                mode,
            )
            .preserve_metadata(config.preserve_metadata)
        })
        .collect();

    let outcomes: Vec<Option<TransferOutcome>> = if config.workers <= 1 {
        queue
            .iter()
            .map(|q| (!shutdown::is_requested()).then(|| executors[q.group].transfer(&q.record)))
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .context("build transfer worker pool")?;
        info!(workers = config.workers, "Dispatching to worker pool");
        pool.install(|| {
            queue
                .par_iter()
                .map(|q| (!shutdown::is_requested()).then(|| executors[q.group].transfer(&q.record)))
                .collect()
        })
    };

    let mut interrupted = false;
    for outcome in outcomes {
        match outcome {
            Some(o) => summary.record(o),
            None => interrupted = true,
        }
    }
    summary.log();
    if interrupted {
        warn!(tag = %Tag::Warning, "Interrupted; remaining files were not processed");
        return Err(MigrateError::Interrupted.into());
    }
    Ok(summary)
}

/// Walk every group's sources and build the transfer queue. Excluded files and
/// sources repeating an already-queued signature are settled here.
fn enumerate(ctx: &RunContext<'_>, summary: &mut Summary) -> Result<Vec<Queued>> {
    let rules = &ctx.config.exclusions;
    let mut seen: HashSet<Signature> = HashSet::new();
    let mut queue = Vec::new();

    for (group, g) in ctx.config.groups.iter().enumerate() {
        for entry in TreeWalker::new(&g.sources, rules).files() {
            if shutdown::is_requested() {
                summary.log();
                return Err(MigrateError::Interrupted.into());
            }
            match rules.exclusion_for_file(&entry.path) {
                Some(Exclusion::Internal) => {
                    debug!(path = %entry.path.display(), "internal artifact ignored");
                    continue;
                }
                Some(reason) => {
                    info!(tag = %Tag::Skip, path = %entry.path.display(), reason = reason.reason(), "Excluded");
                    summary.record(TransferOutcome::SkippedExcluded);
                    continue;
                }
                None => {}
            }
            let path = entry.path.clone();
            let record = match FileRecord::from_entry(entry) {
                Ok(Some(r)) => r,
                Ok(None) => {
                    debug!(path = %path.display(), "not a regular file");
                    continue;
                }
                Err(e) => {
                    let err = MigrateError::FileAccess { path, source: e };
                    error!(tag = %Tag::Error, "{err}");
                    summary.record(TransferOutcome::FailedIO);
                    continue;
                }
            };
            if !seen.insert(Signature::new(&record.relative, record.size)) {
                info!(tag = %Tag::Skip, path = %record.path.display(), "Duplicate source file already queued");
                summary.record(TransferOutcome::SkippedDuplicate);
                continue;
            }
            info!(tag = %Tag::Queue, path = %record.path.display(), size = record.size);
            queue.push(Queued { group, record });
        }
    }
    Ok(queue)
}

/// Counters for a rewrite run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteSummary {
    pub rewritten: usize,
    pub already_done: usize,
    pub would_rewrite: usize,
    pub failed: usize,
    /// Files whose original may have been replaced by unverified content.
    pub needs_inspection: Vec<PathBuf>,
    /// Marker sweep result; `None` for dry runs.
    pub cleanup: Option<CleanupReport>,
}

impl RewriteSummary {
    fn log(&self) {
        info!(
            tag = %Tag::Ok,
            rewritten = self.rewritten,
            already_done = self.already_done,
            would_rewrite = self.would_rewrite,
            failed = self.failed,
            "Rewrite summary"
        );
        for p in &self.needs_inspection {
            error!(tag = %Tag::Error, path = %p.display(), "Needs manual inspection");
        }
    }
}

impl fmt::Display for RewriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rewritten {}, already done {}, would rewrite {}, failed {}",
            self.rewritten, self.already_done, self.would_rewrite, self.failed
        )?;
        if let Some(c) = &self.cleanup {
            write!(f, ", markers removed {}, residual artifacts {}", c.removed, c.residuals.len())?;
        }
        Ok(())
    }
}

/// Rewrite every regular file under `root` in place. Symlinks are never followed or
/// rewritten. After a complete non-dry run the done-markers are swept; an interrupted
/// run keeps them so the next run resumes where this one stopped.
pub fn run_rewrite(root: &Path, config: &Config, hasher: &dyn FileHasher) -> Result<RewriteSummary> {
    validate_rewrite_root(root)?;
    let _lock = if config.disable_locks {
        None
    } else {
        lock_all(&[root.to_path_buf()])?.pop()
    };

    let engine = RewriteEngine::new(hasher).dry_run(config.dry_run);
    let rules = ExclusionRules::none();
    let roots = [root.to_path_buf()];
    let mut summary = RewriteSummary::default();
    let mut current_dir: Option<PathBuf> = None;

    for entry in TreeWalker::new(&roots, &rules)
        .symlinks(SymlinkPolicy::Skip)
        .files()
    {
        if shutdown::is_requested() {
            summary.log();
            warn!(tag = %Tag::Warning, "Interrupted; markers kept for the next run");
            return Err(MigrateError::Interrupted.into());
        }
        let path = entry.path;
        if is_rewrite_artifact(&path) {
            info!(tag = %Tag::Skip, path = %path.display(), "Temp or marker file");
            continue;
        }
        if path.file_name().is_some_and(is_internal_name) {
            debug!(path = %path.display(), "internal file");
            continue;
        }
        let dir = path.parent().map(Path::to_path_buf);
        if dir != current_dir {
            if let Some(d) = &dir {
                info!(dir = %d.display(), "Processing directory");
            }
            current_dir = dir;
        }

        let already = marker_path(&path).exists();
        match engine.rewrite(&path) {
            Ok(RewriteState::Done) if already => summary.already_done += 1,
            Ok(RewriteState::Done) => summary.rewritten += 1,
            Ok(_) => summary.would_rewrite += 1,
            Err(e) => {
                error!(tag = %Tag::Error, path = %path.display(), state = ?e.last_state(), "{e}");
                summary.failed += 1;
                if e.needs_inspection() {
                    summary.needs_inspection.push(path);
                }
            }
        }
    }

    if !config.dry_run {
        summary.cleanup = Some(cleanup_markers(root, config.residual_report_limit));
    }
    summary.log();
    Ok(summary)
}

/// List files under `roots` that the exclusion rules would reject (by name, by
/// extension, or by sitting inside an excluded directory). With `output`, the list is
/// also written there, one path per line.
pub fn scan_unwanted(roots: &[PathBuf], rules: &ExclusionRules, output: Option<&Path>) -> Result<Vec<PathBuf>> {
    let everything = ExclusionRules::none();
    let mut found = Vec::new();
    for entry in TreeWalker::new(roots, &everything).files() {
        let reason = match rules.exclusion_for_file(&entry.path) {
            Some(Exclusion::Internal) => continue,
            Some(r) => Some(r),
            None => entry
                .relative()
                .parent()
                .into_iter()
                .flat_map(Path::components)
                .any(|c| rules.is_excluded_dir(c.as_os_str()))
                .then_some(Exclusion::Directory),
        };
        if let Some(r) = reason {
            info!(path = %entry.path.display(), reason = r.reason(), "Unwanted file");
            found.push(entry.path);
        }
    }
    info!(count = found.len(), "Unwanted file scan complete");

    if let Some(out) = output {
        let mut text = String::new();
        for p in &found {
            text.push_str(&p.display().to_string());
            text.push('\n');
        }
        fs::write(out, text).with_context(|| format!("write unwanted file list '{}'", out.display()))?;
    }
    Ok(found)
}
