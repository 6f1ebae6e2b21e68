//! Core configuration types.
//! - Config holds runtime settings with defaults.
//! - TransferGroup maps a set of source roots onto an ordered set of destinations.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    DEFAULT_EXCLUDED_DIRS, DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_NAMES,
    DEFAULT_HEADROOM_BYTES, DEFAULT_RESIDUAL_REPORT_LIMIT,
};
use crate::classify::ExclusionRules;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Audit lines and warnings (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Sources whose files may only land on these destinations, tried in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferGroup {
    pub sources: Vec<PathBuf>,
    pub destinations: Vec<PathBuf>,
}

impl TransferGroup {
    pub fn new(
        sources: impl IntoIterator<Item = impl Into<PathBuf>>,
        destinations: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            destinations: destinations.into_iter().map(Into::into).collect(),
        }
    }
}

/// Runtime configuration for a migration or rewrite run.
#[derive(Debug, Clone)]
pub struct Config {
    pub groups: Vec<TransferGroup>,
    pub exclusions: ExclusionRules,
    /// Free bytes a destination must keep after accepting a file
    pub headroom_bytes: u64,
    /// Concurrent transfer workers; 1 runs sequentially
    pub workers: usize,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Rewrite only: report what would be rewritten without touching files
    pub dry_run: bool,
    /// Carry permissions, timestamps, ownership and xattrs to copies
    pub preserve_metadata: bool,
    /// Move only: remove already-empty source directories before the run
    pub prune_empty_dirs: bool,
    /// Skip the advisory run lock (filesystems without working locks)
    pub disable_locks: bool,
    /// Residual rewrite artifacts listed by name after cleanup
    pub residual_report_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            exclusions: default_exclusions(),
            headroom_bytes: DEFAULT_HEADROOM_BYTES,
            workers: 1,
            log_level: LogLevel::Normal,
            log_file: None,
            dry_run: false,
            preserve_metadata: true,
            prune_empty_dirs: false,
            disable_locks: false,
            residual_report_limit: DEFAULT_RESIDUAL_REPORT_LIMIT,
        }
    }
}

pub(crate) fn default_exclusions() -> ExclusionRules {
    ExclusionRules::new(
        DEFAULT_EXCLUDED_NAMES.iter().copied(),
        DEFAULT_EXCLUDED_EXTENSIONS.iter().copied(),
        DEFAULT_EXCLUDED_DIRS.iter().copied(),
    )
}

impl Config {
    /// Single-group config; other fields use defaults.
    pub fn new(
        sources: impl IntoIterator<Item = impl Into<PathBuf>>,
        destinations: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        Self {
            groups: vec![TransferGroup::new(sources, destinations)],
            ..Default::default()
        }
    }

    /// Every destination of every group, first occurrence order, no repeats.
    pub fn all_destinations(&self) -> Vec<PathBuf> {
        dedup(self.groups.iter().flat_map(|g| g.destinations.iter()))
    }

    /// Every source of every group, first occurrence order, no repeats.
    pub fn all_sources(&self) -> Vec<PathBuf> {
        dedup(self.groups.iter().flat_map(|g| g.sources.iter()))
    }
}

fn dedup<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for p in paths {
        if !out.contains(p) {
            out.push(p.clone());
        }
    }
    out
}

/// Parse a byte count with an optional binary suffix: `1048576`, `512K`, `500G`,
/// `2TiB`. Case-insensitive; surrounding whitespace is ignored.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let t = s.trim();
    let split = t
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(t.len());
    let (digits, unit) = t.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size: '{s}'"))?;
    let shift = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        "t" | "tb" | "tib" => 40,
        _ => return Err(format!("invalid size unit in '{s}'")),
    };
    n.checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size too large: '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_with_binary_units() {
        assert_eq!(parse_size("1024"), Ok(1024));
        assert_eq!(parse_size(" 1K "), Ok(1024));
        assert_eq!(parse_size("500G"), Ok(DEFAULT_HEADROOM_BYTES));
        assert_eq!(parse_size("2TiB"), Ok(2 << 40));
        assert!(parse_size("12Q").is_err());
        assert!(parse_size("G").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn destinations_union_keeps_first_order() {
        let mut cfg = Config::new(["/s1"], ["/d1", "/d2"]);
        cfg.groups.push(TransferGroup::new(["/s2"], ["/d2", "/d3"]));
        assert_eq!(
            cfg.all_destinations(),
            vec![PathBuf::from("/d1"), PathBuf::from("/d2"), PathBuf::from("/d3")]
        );
        assert_eq!(cfg.all_sources().len(), 2);
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.workers, 1);
        assert!(cfg.preserve_metadata);
        assert!(cfg.exclusions.is_excluded(std::path::Path::new("x/Thumbs.db")));
        assert!(cfg.exclusions.is_excluded(std::path::Path::new("x/a.SRT")));
        assert!(cfg.exclusions.is_excluded_dir(std::ffi::OsStr::new("#recycle")));
    }
}
