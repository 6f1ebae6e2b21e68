//! Tracing setup for the binary.
//!
//! - Level comes from `LogLevel` only (no RUST_LOG override). `Normal` keeps the INFO
//!   audit lines (QUEUE/SKIP/COPY/MOVE/...) and drops per-file debug chatter.
//! - Human output uses [`AuditFormat`], so every audit line reads `[TAG] path: message`.
//!   `--json` switches stdout and the file sink to one JSON object per line, with the
//!   tag as `fields.tag`.
//! - The optional log file goes through a non-blocking appender; the returned guard
//!   must live until shutdown. A log path below a symlinked directory is refused.

use anyhow::Result;
use media_migrate::audit::{AuditFormat, LocalHumanTime};
use media_migrate::output as out;
use media_migrate::platform::open_log_file_secure_append;
use media_migrate::{LogLevel, path_has_symlink_ancestor};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, registry};

type SinkLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter_for(lvl: LogLevel) -> EnvFilter {
    EnvFilter::new(match lvl {
        LogLevel::Quiet => "error",
        LogLevel::Normal => "info",
        LogLevel::Info => "debug",
        LogLevel::Debug => "trace",
    })
}

/// One output sink (stdout or the log file) in the selected format.
fn sink_layer<W>(json: bool, writer: W) -> SinkLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        tsfmt::layer()
            .json()
            .with_timer(LocalHumanTime)
            .with_thread_ids(true)
            .with_writer(writer)
            .boxed()
    } else {
        tsfmt::layer()
            .event_format(AuditFormat::new())
            .with_writer(writer)
            .boxed()
    }
}

/// Open the audit log file for appending, or explain on stderr why not.
fn open_log_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    match path_has_symlink_ancestor(path) {
        Ok(false) => {}
        Ok(true) => {
            eprintln!("Refusing to log to {}: an ancestor directory is a symlink.", path.display());
            return None;
        }
        Err(e) => {
            eprintln!("Could not check log path {} for symlinks: {e}", path.display());
            return None;
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match open_log_file_secure_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            eprintln!("Failed to open log file {}: {e}", path.display());
            None
        }
    }
}

/// Install the global subscriber. Returns the file appender's guard when a log file
/// is active; drop it last so buffered audit lines reach disk.
pub fn init_tracing(
    lvl: LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let mut sinks: Vec<SinkLayer> = vec![sink_layer(json, std::io::stdout)];
    let mut guard = None;

    if let Some(path) = log_file {
        match open_log_writer(path) {
            Some((writer, g)) => {
                sinks.push(sink_layer(json, writer));
                guard = Some(g);
            }
            None => out::print_warn(&format!(
                "Audit log '{}' was not enabled; check the directory exists, is writable and is not behind a symlink. Logging to stdout only.",
                path.display()
            )),
        }
    }

    registry().with(sinks).with(env_filter_for(lvl)).try_init()?;
    Ok(guard)
}
