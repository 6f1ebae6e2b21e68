//! Core library for `media_migrate`.
//!
//! Replicates or moves files from one or more source roots onto an ordered set of
//! destination volumes (space-aware, duplicate-aware, size-verified), and rewrites
//! files in place through a crash-safe copy -> hash -> swap -> hash protocol.
//!
//! The binary (`main.rs`) only parses flags, sets up logging and calls into
//! [`run`]; everything that touches the filesystem lives here.

pub mod audit;
pub mod classify;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod hash;
pub mod index;
pub mod output;
pub mod platform;
pub mod rewrite;
pub mod run;
pub mod shutdown;
pub mod transfer;
mod utils;
pub mod walk;

pub use audit::{AuditFormat, Tag};
pub use classify::ExclusionRules;
pub use config::{
    Config, LogLevel, TransferGroup, default_config_path, default_data_dir, default_log_path,
    load_config, load_config_from_xml_path, path_has_symlink_ancestor,
};
pub use errors::{MigrateError, exit_code_for};
pub use fs_ops::space::{DestinationSelector, FsSpaceProbe, SpaceProbe};
pub use hash::{FileHasher, Sha256Hasher};
pub use index::{ExistingIndex, Presence, Signature};
pub use rewrite::{RewriteEngine, RewriteError, RewriteState};
pub use run::{RewriteSummary, RunContext, Summary, run_rewrite, run_transfer, scan_unwanted};
pub use transfer::{FileRecord, TransferExecutor, TransferMode, TransferOutcome};
pub use utils::pool_name;
pub use walk::{SymlinkPolicy, TreeWalker, WalkEntry};
