//! Lazy depth-first traversal of one or more roots.
//!
//! Excluded directories are pruned before descent (their contents are never read).
//! Entries that cannot be read are logged and skipped; a broken subtree never aborts
//! the walk. Symlinks are either skipped (rewrite) or handed out like regular files
//! (transfers), per [`SymlinkPolicy`].

use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::audit::Tag;
use crate::classify::ExclusionRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkPolicy {
    /// Yield symlinks like any other non-directory entry.
    #[default]
    AsFile,
    /// Never yield symlinks.
    Skip,
}

/// A discovered file together with the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub root: PathBuf,
}

impl WalkEntry {
    /// Path relative to the originating root.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }
}

pub struct TreeWalker<'a> {
    roots: Vec<PathBuf>,
    rules: &'a ExclusionRules,
    symlinks: SymlinkPolicy,
}

impl<'a> TreeWalker<'a> {
    pub fn new(roots: &[PathBuf], rules: &'a ExclusionRules) -> Self {
        Self {
            roots: roots.to_vec(),
            rules,
            symlinks: SymlinkPolicy::default(),
        }
    }

    pub fn symlinks(mut self, policy: SymlinkPolicy) -> Self {
        self.symlinks = policy;
        self
    }

    /// Lazily yield every non-directory entry under each root, roots in order,
    /// siblings sorted by name.
    pub fn files(&self) -> impl Iterator<Item = WalkEntry> + '_ {
        let rules = self.rules;
        let policy = self.symlinks;
        self.roots.iter().flat_map(move |root| {
            WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(move |e| {
                    let prune = e.depth() > 0
                        && e.file_type().is_dir()
                        && rules.is_excluded_dir(e.file_name());
                    if prune {
                        info!(tag = %Tag::Skip, path = %e.path().display(), "Excluded directory");
                    }
                    !prune
                })
                .filter_map(|res| match res {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        let path = err
                            .path()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default();
                        error!(tag = %Tag::Error, path = %path, error = %err, "unreadable entry skipped");
                        None
                    }
                })
                .filter(|e| !e.file_type().is_dir())
                .filter_map(move |e| {
                    if e.path_is_symlink() && policy == SymlinkPolicy::Skip {
                        info!(tag = %Tag::Skip, path = %e.path().display(), "Symlink not followed");
                        return None;
                    }
                    Some(WalkEntry {
                        path: e.into_path(),
                        root: root.clone(),
                    })
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn prunes_excluded_directories() {
        let td = tempdir().unwrap();
        let root = td.path().to_path_buf();
        fs::create_dir_all(root.join("keep/inner")).unwrap();
        fs::create_dir_all(root.join("#Recycle/deep")).unwrap();
        fs::write(root.join("keep/inner/a.mkv"), b"a").unwrap();
        fs::write(root.join("#Recycle/deep/b.mkv"), b"b").unwrap();
        fs::write(root.join("top.txt"), b"t").unwrap();

        let rules = ExclusionRules::new(Vec::<&str>::new(), Vec::<&str>::new(), ["#recycle"]);
        let roots = vec![root.clone()];
        let found: Vec<_> = TreeWalker::new(&roots, &rules)
            .files()
            .map(|e| e.relative().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![PathBuf::from("keep/inner/a.mkv"), PathBuf::from("top.txt")]
        );
    }

    #[test]
    fn entries_remember_their_root() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::write(a.path().join("1.bin"), b"1").unwrap();
        fs::write(b.path().join("2.bin"), b"2").unwrap();
        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let rules = ExclusionRules::none();
        let entries: Vec<_> = TreeWalker::new(&roots, &rules).files().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].root, a.path());
        assert_eq!(entries[1].root, b.path());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_policy_skip() {
        let td = tempdir().unwrap();
        let target = td.path().join("real.bin");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, td.path().join("link.bin")).unwrap();
        let roots = vec![td.path().to_path_buf()];
        let rules = ExclusionRules::none();

        let all = TreeWalker::new(&roots, &rules).files().count();
        let skipped = TreeWalker::new(&roots, &rules)
            .symlinks(SymlinkPolicy::Skip)
            .files()
            .count();
        assert_eq!(all, 2);
        assert_eq!(skipped, 1);
    }
}
