//! Config validation logic.
//! Verifies group shape, source/destination directories, writability and that no
//! source and destination overlap. Every failure is a `MigrateError::Precondition`
//! so the binary exits with the precondition code before any file is touched.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::Config;
use crate::errors::MigrateError;
use crate::utils::is_writable_probe;

type Checked<T = ()> = Result<T, MigrateError>;

fn precondition(msg: String) -> MigrateError {
    MigrateError::Precondition(msg)
}

impl Config {
    /// Validate everything a transfer run relies on. Missing destinations are created.
    pub fn validate(&self) -> Checked {
        if self.groups.is_empty() {
            return Err(precondition(
                "no source/destination group configured (use --source/--dest or a <group> in config.xml)".into(),
            ));
        }
        if self.workers == 0 {
            return Err(precondition("workers must be at least 1".into()));
        }
        for (i, group) in self.groups.iter().enumerate() {
            if group.sources.is_empty() {
                return Err(precondition(format!("group {} has no source", i + 1)));
            }
            if group.destinations.is_empty() {
                return Err(precondition(format!("group {} has no destination", i + 1)));
            }
        }

        let sources = self.all_sources();
        let destinations = self.all_destinations();
        for src in &sources {
            ensure_dir_exists_and_is_dir(src, "source")?;
            ensure_readable(src, "source")?;
        }
        for dest in &destinations {
            ensure_dir_is_or_create(dest, "destination")?;
            ensure_writable(dest, "destination")?;
        }
        ensure_disjoint(&sources, &destinations)?;

        info!(
            groups = self.groups.len(),
            sources = sources.len(),
            destinations = destinations.len(),
            headroom = self.headroom_bytes,
            workers = self.workers,
            "Config validated"
        );
        Ok(())
    }
}

/// A rewrite root must be an existing, readable and writable directory.
pub fn validate_rewrite_root(root: &Path) -> Checked {
    ensure_dir_exists_and_is_dir(root, "rewrite root")?;
    ensure_readable(root, "rewrite root")?;
    ensure_writable(root, "rewrite root")
}

fn ensure_dir_exists_and_is_dir(path: &Path, name: &str) -> Checked {
    if !path.exists() {
        return Err(precondition(format!("{name} does not exist: {}", path.display())));
    }
    if !path.is_dir() {
        return Err(precondition(format!("{name} is not a directory: {}", path.display())));
    }
    Ok(())
}

fn ensure_readable(path: &Path, name: &str) -> Checked {
    fs::read_dir(path).map_err(|e| {
        precondition(format!("cannot read {name} '{}': {e}", path.display()))
    })?;
    debug!("{name} readable: {}", path.display());
    Ok(())
}

/// Create the directory when missing; an existing path must be a directory.
/// Concurrent creation by another process counts as success.
fn ensure_dir_is_or_create(path: &Path, name: &str) -> Checked {
    if path.exists() {
        if !path.is_dir() {
            return Err(precondition(format!(
                "{name} exists but isn't a directory: {}",
                path.display()
            )));
        }
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| {
        precondition(format!("cannot create {name} '{}': {e}", path.display()))
    })?;
    info!("Created {name} directory: {}", path.display());
    Ok(())
}

fn ensure_writable(path: &Path, name: &str) -> Checked {
    is_writable_probe(path).map_err(|e| {
        precondition(format!("cannot write to {name} '{}': {e}", path.display()))
    })?;
    debug!("{name} writable: {}", path.display());
    Ok(())
}

/// No source may equal, contain or sit inside any destination (symlinks resolved).
fn ensure_disjoint(sources: &[PathBuf], destinations: &[PathBuf]) -> Checked {
    let real = |p: &PathBuf| fs::canonicalize(p).unwrap_or_else(|_| p.clone());
    for s in sources {
        let s_real = real(s);
        for d in destinations {
            let d_real = real(d);
            if s_real == d_real {
                return Err(precondition(format!(
                    "source and destination resolve to the same path: '{}'",
                    s_real.display()
                )));
            }
            if s_real.starts_with(&d_real) {
                return Err(precondition(format!(
                    "source '{}' must not be inside destination '{}'",
                    s_real.display(),
                    d_real.display()
                )));
            }
            if d_real.starts_with(&s_real) {
                return Err(precondition(format!(
                    "destination '{}' must not be inside source '{}'",
                    d_real.display(),
                    s_real.display()
                )));
            }
        }
    }
    Ok(())
}
