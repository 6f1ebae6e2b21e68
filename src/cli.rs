//! CLI definition and parsing.
//!
//! Notes:
//! - CLI flags override config values (loaded from XML if present).
//! - `--source`/`--dest` replace the configured groups with a single group; a side
//!   that is not given on the command line is taken from the config.
//! - `--debug` is a shorthand for `--log-level debug`.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel, TransferGroup, parse_size};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Space-aware media migration across volumes, with crash-safe in-place rewrite"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file to use instead of $MEDIA_MIGRATE_CONFIG / the OS default.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Append logs to this file as well as stdout.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable run locking (for ZFS/NFS/network shares where flock may fail).
    #[arg(long, global = true)]
    pub disable_locks: bool,

    /// Print the config file location and exit.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Copy eligible source files onto the destinations.
    Copy(TransferArgs),
    /// Move eligible source files onto the destinations, pruning emptied folders.
    Move(TransferArgs),
    /// Rewrite every file under ROOT in place (copy, verify, swap, verify).
    Rewrite {
        #[arg(value_hint = ValueHint::DirPath)]
        root: PathBuf,
        /// Report what would be rewritten without touching anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// List files matching the exclusion rules (default roots: all destinations).
    ScanUnwanted {
        #[arg(value_hint = ValueHint::DirPath)]
        roots: Vec<PathBuf>,
        /// Also write the list to FILE, one path per line.
        #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Source root (repeatable).
    #[arg(long = "source", short = 's', value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub sources: Vec<PathBuf>,

    /// Destination root in priority order (repeatable).
    #[arg(long = "dest", short = 't', value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub destinations: Vec<PathBuf>,

    /// Free space each destination must keep (bytes, or with K/M/G/T suffix).
    #[arg(long, value_parser = parse_size)]
    pub headroom: Option<u64>,

    /// Concurrent transfer workers (1 = sequential).
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,

    /// Move only: remove already-empty source folders before starting.
    #[arg(long)]
    pub prune_empty: bool,

    /// Do not carry permissions, timestamps, ownership or xattrs to copies.
    #[arg(long)]
    pub no_preserve_metadata: bool,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    s.parse()
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level
    }

    /// True when the command needs source/destination groups and none are given
    /// on the command line.
    pub fn needs_configured_groups(&self) -> bool {
        match &self.command {
            Some(Command::Copy(t)) | Some(Command::Move(t)) => {
                t.sources.is_empty() || t.destinations.is_empty()
            }
            _ => false,
        }
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(f) = &self.log_file {
            cfg.log_file = Some(f.clone());
        }
        if self.disable_locks {
            cfg.disable_locks = true;
        }
        match &self.command {
            Some(Command::Copy(t)) | Some(Command::Move(t)) => t.apply(cfg),
            Some(Command::Rewrite { dry_run, .. }) => {
                if *dry_run {
                    cfg.dry_run = true;
                }
            }
            Some(Command::ScanUnwanted { .. }) | None => {}
        }
    }
}

impl TransferArgs {
    fn apply(&self, cfg: &mut Config) {
        if !self.sources.is_empty() || !self.destinations.is_empty() {
            let sources = if self.sources.is_empty() {
                cfg.all_sources()
            } else {
                self.sources.clone()
            };
            let destinations = if self.destinations.is_empty() {
                cfg.all_destinations()
            } else {
                self.destinations.clone()
            };
            cfg.groups = vec![TransferGroup {
                sources,
                destinations,
            }];
        }
        if let Some(h) = self.headroom {
            cfg.headroom_bytes = h;
        }
        if let Some(w) = self.workers {
            cfg.workers = w;
        }
        if self.prune_empty {
            cfg.prune_empty_dirs = true;
        }
        if self.no_preserve_metadata {
            cfg.preserve_metadata = false;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_flags_override_config() {
        let args = Args::try_parse_from([
            "media_migrate",
            "move",
            "--source",
            "/in",
            "--dest",
            "/d1",
            "--dest",
            "/d2",
            "--headroom",
            "1G",
            "-j",
            "3",
            "--prune-empty",
            "--debug",
        ])
        .unwrap();
        let mut cfg = Config::new(["/old"], ["/olddest"]);
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.groups.len(), 1);
        assert_eq!(cfg.groups[0].sources, vec![PathBuf::from("/in")]);
        assert_eq!(
            cfg.groups[0].destinations,
            vec![PathBuf::from("/d1"), PathBuf::from("/d2")]
        );
        assert_eq!(cfg.headroom_bytes, 1 << 30);
        assert_eq!(cfg.workers, 3);
        assert!(cfg.prune_empty_dirs);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert!(!args.needs_configured_groups());
    }

    #[test]
    fn missing_side_comes_from_config() {
        let args = Args::try_parse_from(["media_migrate", "copy", "--source", "/in"]).unwrap();
        let mut cfg = Config::new(["/old"], ["/d1"]);
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.groups[0].sources, vec![PathBuf::from("/in")]);
        assert_eq!(cfg.groups[0].destinations, vec![PathBuf::from("/d1")]);
        assert!(args.needs_configured_groups());
    }

    #[test]
    fn rewrite_dry_run_and_global_flags() {
        let args = Args::try_parse_from([
            "media_migrate",
            "rewrite",
            "/mnt/tank",
            "--dry-run",
            "--log-level",
            "quiet",
            "--disable-locks",
        ])
        .unwrap();
        let mut cfg = Config::default();
        args.apply_overrides(&mut cfg);
        assert!(cfg.dry_run);
        assert!(cfg.disable_locks);
        assert_eq!(cfg.log_level, LogLevel::Quiet);
    }

    #[test]
    fn bad_values_rejected() {
        assert!(Args::try_parse_from(["media_migrate", "copy", "--headroom", "lots"]).is_err());
        assert!(Args::try_parse_from(["media_migrate", "--log-level", "loud", "copy"]).is_err());
    }
}
