//! Typed error definitions for media_migrate.
//! Only `Precondition` and `Interrupted` end a run early; the per-file kinds are
//! raised inside a single transfer or rewrite and turned into outcomes there.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Cannot access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Integrity check failed for {path}: {detail}")]
    Integrity { path: PathBuf, detail: String },

    #[error("No destination has room for {path}: need {required} bytes plus headroom")]
    Capacity { path: PathBuf, required: u64 },

    #[error("Cleanup failed for {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Operation interrupted by user")]
    Interrupted,
}

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PRECONDITION: u8 = 2;
pub const EXIT_INTERRUPTED: u8 = 130;

impl MigrateError {
    /// Process exit code for a run that ended with this error.
    pub fn code(&self) -> u8 {
        match self {
            MigrateError::Precondition(_) => EXIT_PRECONDITION,
            MigrateError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

/// Exit code for an arbitrary run failure: typed errors keep their code, anything
/// else is a generic failure.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<MigrateError>())
        .map(MigrateError::code)
        .unwrap_or(EXIT_FAILURE)
}
