//! Existing-file index.
//!
//! One scan over every destination root, done before any transfer starts. Each file is
//! reduced to a [`Signature`] (lower-cased relative path + byte size); membership is
//! then an O(1) hash lookup per candidate, with no further disk access.
//!
//! The index is never refreshed mid-run. Files that cannot be stat'ed are left out,
//! which can only cause a redundant copy, never a missed one.
//!
//! The scan also reconciles crashed runs: staging temps left behind by an interrupted
//! transfer are not indexed and are removed once they are old enough to be abandoned.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

use crate::audit::Tag;
use crate::classify::{ExclusionRules, is_internal_name};
use crate::fs_ops::is_staging_temp;
use crate::walk::TreeWalker;

/// Staging temps younger than this may belong to a concurrent run and are left alone.
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// Cheap content-identity proxy: same relative path (case-insensitively) and size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub path: String,
    pub size: u64,
}

impl Signature {
    pub fn new(relative: &Path, size: u64) -> Self {
        Self {
            path: relative_key(relative).to_lowercase(),
            size,
        }
    }
}

/// Result of an index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Absent,
    /// Same path (exact spelling) and size already on a destination.
    Exact,
    /// Only a differently-cased twin of equal size exists.
    CaseCollision { existing: String },
}

/// Case-preserving, separator-normalized form of a relative path (`a/b/c.mkv`).
pub fn relative_key(relative: &Path) -> String {
    let mut key = String::new();
    for comp in relative.components() {
        if let Component::Normal(part) = comp {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(&part.to_string_lossy());
        }
    }
    key
}

#[derive(Debug, Default, Clone)]
pub struct ExistingIndex {
    // signature -> on-disk spellings seen for it
    entries: HashMap<Signature, Vec<String>>,
}

impl ExistingIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Walk every destination root once and record each file's signature.
    pub fn build(destination_roots: &[PathBuf]) -> Self {
        let mut index = Self::empty();
        let rules = ExclusionRules::none();
        info!("Building existing file index...");
        for root in destination_roots {
            info!(root = %root.display(), "Indexing");
            let roots = [root.clone()];
            for entry in TreeWalker::new(&roots, &rules).files() {
                if let Some(name) = entry.path.file_name()
                    && is_internal_name(name)
                {
                    if is_staging_temp(name) {
                        reclaim_staging_temp(&entry.path);
                    }
                    continue;
                }
                match fs::metadata(&entry.path) {
                    Ok(meta) if meta.is_file() => index.insert(entry.relative(), meta.len()),
                    Ok(_) => debug!(path = %entry.path.display(), "not a regular file; not indexed"),
                    Err(e) => {
                        error!(tag = %Tag::Error, path = %entry.path.display(), error = %e, "Skipping during index")
                    }
                }
            }
        }
        info!(files = index.len(), "Indexed existing files");
        index
    }

    pub fn insert(&mut self, relative: &Path, size: u64) {
        let spelling = relative_key(relative);
        let spellings = self.entries.entry(Signature::new(relative, size)).or_default();
        if !spellings.contains(&spelling) {
            spellings.push(spelling);
        }
    }

    pub fn lookup(&self, relative: &Path, size: u64) -> Presence {
        let Some(spellings) = self.entries.get(&Signature::new(relative, size)) else {
            return Presence::Absent;
        };
        let wanted = relative_key(relative);
        if spellings.iter().any(|s| *s == wanted) {
            Presence::Exact
        } else {
            Presence::CaseCollision {
                existing: spellings[0].clone(),
            }
        }
    }

    /// Membership query by signature, ignoring case.
    pub fn already_present(&self, relative: &Path, size: u64) -> bool {
        self.entries.contains_key(&Signature::new(relative, size))
    }

    /// Number of distinct signatures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn reclaim_staging_temp(path: &Path) {
    let age = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok());
    match age {
        Some(age) if age >= STALE_STAGING_AGE => match fs::remove_file(path) {
            Ok(()) => info!(tag = %Tag::Cleanup, path = %path.display(), "Removed orphan staging temp"),
            Err(e) => {
                warn!(tag = %Tag::Warning, path = %path.display(), error = %e, "Failed to remove orphan staging temp")
            }
        },
        _ => debug!(path = %path.display(), "recent staging temp left in place"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use tempfile::tempdir;

    #[test]
    fn signature_ignores_case_and_separator_style() {
        let a = Signature::new(Path::new("Movies/Foo (2020)/Foo.mkv"), 10);
        let b = Signature::new(Path::new("movies/foo (2020)/FOO.MKV"), 10);
        assert_eq!(a, b);
        assert_ne!(a, Signature::new(Path::new("movies/foo (2020)/foo.mkv"), 11));
    }

    #[test]
    fn lookup_distinguishes_case_collisions() {
        let mut idx = ExistingIndex::empty();
        idx.insert(Path::new("TV/Show/ep1.mkv"), 42);
        assert_eq!(idx.lookup(Path::new("TV/Show/ep1.mkv"), 42), Presence::Exact);
        assert_eq!(
            idx.lookup(Path::new("tv/show/EP1.mkv"), 42),
            Presence::CaseCollision {
                existing: "TV/Show/ep1.mkv".into()
            }
        );
        assert_eq!(idx.lookup(Path::new("TV/Show/ep1.mkv"), 43), Presence::Absent);
        assert!(idx.already_present(Path::new("tv/show/ep1.MKV"), 42));
    }

    #[test]
    fn build_reclaims_only_stale_staging_temps() {
        let td = tempdir().unwrap();
        let root = td.path().to_path_buf();
        fs::create_dir_all(root.join("m")).unwrap();
        fs::write(root.join("m/a.mkv"), b"12345").unwrap();
        let stale = root.join("m/.media_migrate.1.2.tmp");
        let fresh = root.join("m/.media_migrate.3.4.tmp");
        fs::write(&stale, b"partial").unwrap();
        fs::write(&fresh, b"partial").unwrap();
        set_file_mtime(&stale, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

        let idx = ExistingIndex::build(&[root.clone()]);
        assert_eq!(idx.len(), 1);
        assert!(idx.already_present(Path::new("M/A.mkv"), 5));
        assert!(!stale.exists(), "stale staging temp should be removed");
        assert!(fresh.exists(), "fresh staging temp must be left alone");
    }
}
