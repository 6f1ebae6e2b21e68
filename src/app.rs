//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler and
//! dispatches the subcommand. Returns the process exit code.

use anyhow::{Result, anyhow};
use chrono::Local;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use media_migrate::cli::{Args, Command};
use media_migrate::config::{CONFIG_ENV, ensure_default_config_exists};
use media_migrate::errors::{EXIT_FAILURE, EXIT_PRECONDITION};
use media_migrate::output as out;
use media_migrate::{
    Config, FsSpaceProbe, MigrateError, Sha256Hasher, TransferMode, default_config_path,
    default_data_dir, exit_code_for, load_config, pool_name, run_rewrite, run_transfer,
    scan_unwanted, shutdown,
};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> ExitCode {
    if args.print_config {
        print_config_location();
        return ExitCode::SUCCESS;
    }

    let Some(command) = args.command.clone() else {
        out::print_error("no command given; try --help");
        return ExitCode::from(EXIT_PRECONDITION);
    };

    // Create a template config on first use (before logging init).
    if args.config.is_none()
        && let Some(path) = ensure_default_config_exists()
    {
        out::print_success(&format!("A template config was written to: {}", path.display()));
        if args.needs_configured_groups() {
            out::print_info("Edit its <group> entries (or pass --source/--dest), then re-run.");
            return ExitCode::SUCCESS;
        }
    }

    let mut cfg = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            out::print_error(&format!("{e:#}"));
            return ExitCode::from(EXIT_PRECONDITION);
        }
    };
    args.apply_overrides(&mut cfg);

    if let Command::Rewrite { root, .. } = &command
        && cfg.log_file.is_none()
    {
        cfg.log_file = rewrite_log_path(root);
    }

    let guard_opt = match init_tracing(cfg.log_level, cfg.log_file.as_deref(), args.json) {
        Ok(g) => g,
        Err(e) => {
            out::print_error(&format!("Failed to initialize logging: {e}"));
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    // The guard is dropped on Ctrl-C as well so the file sink is flushed.
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing the current file...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        }) {
            out::print_warn(&format!("could not install interrupt handler: {e}"));
        }
    }

    debug!(?command, "Starting media_migrate");

    let result = dispatch(&command, &cfg);
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            let code = exit_code_for(&e);
            error!(code, error = %format!("{e:#}"), "Run failed");
            out::print_error(&format!("{e:#}"));
            code
        }
    };

    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }
    ExitCode::from(code)
}

fn dispatch(command: &Command, cfg: &Config) -> Result<()> {
    match command {
        Command::Copy(_) | Command::Move(_) => {
            let mode = if matches!(command, Command::Move(_)) {
                TransferMode::Move
            } else {
                TransferMode::Copy
            };
            let summary = run_transfer(cfg, mode, &FsSpaceProbe)?;
            out::print_success(&summary.to_string());
            if summary.failed > 0 {
                out::print_warn(&format!("{} file(s) failed; see the log for details", summary.failed));
            }
        }
        Command::Rewrite { root, .. } => {
            let summary = run_rewrite(root, cfg, &Sha256Hasher)?;
            out::print_success(&summary.to_string());
            for p in &summary.needs_inspection {
                out::print_error(&format!("inspect manually: {}", p.display()));
            }
        }
        Command::ScanUnwanted { roots, output } => {
            let roots = if roots.is_empty() {
                cfg.all_destinations()
            } else {
                roots.clone()
            };
            if roots.is_empty() {
                return Err(anyhow!(MigrateError::Precondition(
                    "no roots given and no destinations configured".into()
                )));
            }
            for r in &roots {
                if !r.is_dir() {
                    return Err(anyhow!(MigrateError::Precondition(format!(
                        "not a directory: {}",
                        r.display()
                    ))));
                }
            }
            let found = scan_unwanted(&roots, &cfg.exclusions, output.as_deref())?;
            if output.is_none() {
                for p in &found {
                    out::print_user(&p.display().to_string());
                }
            }
            out::print_success(&format!("{} unwanted file(s) found", found.len()));
        }
    }
    Ok(())
}

/// `<data dir>/rewrite_<pool>_<YYYYmmdd_HHMMSS>.log`
fn rewrite_log_path(root: &std::path::Path) -> Option<PathBuf> {
    let dir = default_data_dir().ok()?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    Some(dir.join(format!("rewrite_{}_{stamp}.log", pool_name(root))))
}

fn print_config_location() {
    if let Some(cfg_env) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            PathBuf::from(cfg_env).display()
        ));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run any command to create a template.");
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}
