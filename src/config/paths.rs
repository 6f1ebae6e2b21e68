//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/log paths and detects symlinked ancestors.

use anyhow::{Result, anyhow};
use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file (or a directory holding
/// `config.xml`).
pub const CONFIG_ENV: &str = "MEDIA_MIGRATE_CONFIG";

const APP_DIR: &str = "media_migrate";

/// Config path: `$MEDIA_MIGRATE_CONFIG` when set, else the OS config dir.
/// A relative override is resolved against the current directory.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(raw) = env::var_os(CONFIG_ENV) {
        let mut p = PathBuf::from(raw);
        if p.is_relative() {
            p = env::current_dir()?.join(p);
        }
        if p.is_dir() {
            p.push("config.xml");
        }
        return Ok(p);
    }
    let mut base = config_dir()
        .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or_else(|| anyhow!("cannot determine a config directory"))?;
    base.push(APP_DIR);
    base.push("config.xml");
    Ok(base)
}

/// Per-user data directory for logs (created best-effort).
pub fn default_data_dir() -> Result<PathBuf> {
    let mut base = data_dir()
        .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .ok_or_else(|| anyhow!("cannot determine a data directory"))?;
    base.push(APP_DIR);
    let _ = fs::create_dir_all(&base);
    Ok(base)
}

/// Suggested log file location written into the config template.
pub fn default_log_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("media_migrate.log"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}
