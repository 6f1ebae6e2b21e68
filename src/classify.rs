//! Path classification.
//!
//! Decides whether a discovered file (or a directory about to be descended into)
//! takes part in a run. All comparisons are on lower-cased names; the rule sets are
//! normalized once at construction so lookups stay allocation-light and pure.
//!
//! Files whose names start with [`INTERNAL_PREFIX`] are our own artifacts (run
//! locks, staging temps) and are always excluded.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

/// Prefix shared by every artifact this crate leaves in a tree while running.
pub const INTERNAL_PREFIX: &str = ".media_migrate.";

/// Why a path was excluded; used for the SKIP audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Name,
    Extension,
    Directory,
    Internal,
}

impl Exclusion {
    pub fn reason(self) -> &'static str {
        match self {
            Exclusion::Name => "excluded filename",
            Exclusion::Extension => "excluded extension",
            Exclusion::Directory => "excluded directory",
            Exclusion::Internal => "internal artifact",
        }
    }
}

/// Exclusion sets, injected per deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    names: HashSet<String>,
    extensions: HashSet<String>,
    dirs: HashSet<String>,
}

impl ExclusionRules {
    /// Build rules from raw strings. Names and directories are lower-cased;
    /// extensions are lower-cased and given a leading dot (`srt` -> `.srt`).
    pub fn new<N, E, D>(names: N, extensions: E, dirs: D) -> Self
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            names: normalize_all(names, |s| s.to_lowercase()),
            extensions: normalize_all(extensions, |s| {
                let lower = s.to_lowercase();
                if lower.starts_with('.') { lower } else { format!(".{lower}") }
            }),
            dirs: normalize_all(dirs, |s| s.to_lowercase()),
        }
    }

    /// Rules that exclude nothing but internal artifacts.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    /// True when the file at `path` must not be processed.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclusion_for_file(path).is_some()
    }

    /// Classify a file path; `None` means eligible.
    pub fn exclusion_for_file(&self, path: &Path) -> Option<Exclusion> {
        let name = path.file_name()?;
        if is_internal_name(name) {
            return Some(Exclusion::Internal);
        }
        let lower = name.to_string_lossy().to_lowercase();
        if self.names.contains(&lower) {
            return Some(Exclusion::Name);
        }
        if let Some(ext) = extension_of(&lower)
            && self.extensions.contains(ext)
        {
            return Some(Exclusion::Extension);
        }
        None
    }

    /// True when traversal must not descend into the directory named `name`.
    pub fn is_excluded_dir(&self, name: &OsStr) -> bool {
        self.dirs.contains(&name.to_string_lossy().to_lowercase())
    }
}

/// True for names created by this crate (locks, staging temps).
pub fn is_internal_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with(INTERNAL_PREFIX)
}

/// Extension of a lower-cased file name including its dot, matching the
/// "suffix" notion: `movie.en.srt` -> `.srt`, `.ds_store` -> none.
fn extension_of(lower_name: &str) -> Option<&str> {
    let idx = lower_name.rfind('.')?;
    if idx == 0 || idx + 1 == lower_name.len() {
        return None;
    }
    Some(&lower_name[idx..])
}

fn normalize_all<I>(items: I, f: impl Fn(&str) -> String) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| f(&s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rules() -> ExclusionRules {
        ExclusionRules::new(["thumbs.db", ".DS_Store"], ["srt", ".TMP", ".bak"], ["#recycle"])
    }

    #[test]
    fn names_match_case_insensitively() {
        let r = rules();
        assert!(r.is_excluded(Path::new("/x/y/Thumbs.DB")));
        assert_eq!(
            r.exclusion_for_file(Path::new("/x/.ds_store")),
            Some(Exclusion::Name)
        );
        assert!(!r.is_excluded(Path::new("/x/thumbs.db.mkv")));
    }

    #[test]
    fn extensions_normalized_with_dot() {
        let r = rules();
        assert_eq!(
            r.exclusion_for_file(Path::new("a/b/Movie.EN.srt")),
            Some(Exclusion::Extension)
        );
        assert!(r.is_excluded(Path::new("scratch.tmp")));
        assert!(!r.is_excluded(Path::new("movie.mkv")));
        // a bare dotfile has no extension
        assert!(!ExclusionRules::new(Vec::<&str>::new(), ["bak"], Vec::<&str>::new())
            .is_excluded(Path::new(".bak")));
    }

    #[test]
    fn internal_artifacts_always_excluded() {
        let r = ExclusionRules::none();
        let p = PathBuf::from("/d/.media_migrate.123.456.tmp");
        assert_eq!(r.exclusion_for_file(&p), Some(Exclusion::Internal));
    }

    #[test]
    fn directory_rule() {
        let r = rules();
        assert!(r.is_excluded_dir(OsStr::new("#RECYCLE")));
        assert!(!r.is_excluded_dir(OsStr::new("recycle")));
    }
}
