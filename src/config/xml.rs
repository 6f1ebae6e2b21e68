//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a secure template if missing (unless MEDIA_MIGRATE_CONFIG is set).
//!
//! Notes:
//! - Unknown XML fields are a hard error, so typos surface before any file is touched.
//! - Repeated elements (`<group>`, `<source>`, `<exclude_name>`, ...) must be written
//!   next to each other; quick_xml does not merge interleaved lists.
//! - Directory validation happens in `validate`, not here.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::paths::{CONFIG_ENV, default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel, TransferGroup, default_exclusions, parse_size};
use super::{
    DEFAULT_EXCLUDED_DIRS, DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_NAMES,
    DEFAULT_HEADROOM_BYTES,
};
use crate::classify::ExclusionRules;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config", deny_unknown_fields)]
struct XmlConfig {
    #[serde(rename = "group", default)]
    groups: Vec<XmlGroup>,
    #[serde(rename = "exclude_name", default)]
    exclude_names: Vec<String>,
    #[serde(rename = "exclude_extension", default)]
    exclude_extensions: Vec<String>,
    #[serde(rename = "exclude_dir", default)]
    exclude_dirs: Vec<String>,
    #[serde(default, deserialize_with = "de_size_trimmed_opt")]
    headroom: Option<u64>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    workers: Option<usize>,
    log_level: Option<String>,
    log_file: Option<String>,
    dry_run: Option<bool>,
    preserve_metadata: Option<bool>,
    prune_empty_dirs: Option<bool>,
    disable_locks: Option<bool>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    residual_report_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct XmlGroup {
    #[serde(rename = "source", default)]
    sources: Vec<String>,
    #[serde(rename = "destination", default)]
    destinations: Vec<String>,
}

fn de_size_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_size(s).map(Some).map_err(serde::de::Error::custom),
    }
}

fn de_usize_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<usize>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn trimmed_paths(items: &[String]) -> Vec<PathBuf> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Each exclusion list replaces its default only when the file names at least one entry.
fn exclusions_from(parsed: &XmlConfig) -> ExclusionRules {
    if parsed.exclude_names.is_empty()
        && parsed.exclude_extensions.is_empty()
        && parsed.exclude_dirs.is_empty()
    {
        return default_exclusions();
    }
    fn pick<'a>(given: &'a [String], default: &'a [&'a str]) -> Vec<&'a str> {
        if given.is_empty() {
            default.to_vec()
        } else {
            given.iter().map(String::as_str).collect()
        }
    }
    ExclusionRules::new(
        pick(&parsed.exclude_names, DEFAULT_EXCLUDED_NAMES),
        pick(&parsed.exclude_extensions, DEFAULT_EXCLUDED_EXTENSIONS),
        pick(&parsed.exclude_dirs, DEFAULT_EXCLUDED_DIRS),
    )
}

fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config {
        exclusions: exclusions_from(&parsed),
        ..Config::default()
    };

    cfg.groups = parsed
        .groups
        .iter()
        .map(|g| TransferGroup {
            sources: trimmed_paths(&g.sources),
            destinations: trimmed_paths(&g.destinations),
        })
        .collect();

    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s.trim().parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    cfg.headroom_bytes = parsed.headroom.unwrap_or(DEFAULT_HEADROOM_BYTES);
    if let Some(w) = parsed.workers {
        cfg.workers = w;
    }
    if let Some(n) = parsed.residual_report_limit {
        cfg.residual_report_limit = n;
    }
    cfg.dry_run = parsed.dry_run.unwrap_or(cfg.dry_run);
    cfg.preserve_metadata = parsed.preserve_metadata.unwrap_or(cfg.preserve_metadata);
    cfg.prune_empty_dirs = parsed.prune_empty_dirs.unwrap_or(cfg.prune_empty_dirs);
    cfg.disable_locks = parsed.disable_locks.unwrap_or(cfg.disable_locks);
    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Resolve and load the active config file.
///
/// - `explicit` (from `--config`) must exist.
/// - Otherwise `$MEDIA_MIGRATE_CONFIG` / the OS default is used; a missing default file
///   yields `Config::default()` and a template is created for next time.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(p) = explicit {
        if !p.exists() {
            bail!("config file not found: {}", p.display());
        }
        return load_config_from_xml_path(p);
    }
    let path = default_config_path()?;
    if path.exists() {
        debug!(path = %path.display(), "loading config");
        return load_config_from_xml_path(&path);
    }
    if env::var_os(CONFIG_ENV).is_some() {
        bail!("{CONFIG_ENV} points to a missing file: {}", path.display());
    }
    if let Err(e) = create_template_config(&path) {
        debug!(path = %path.display(), error = %e, "could not create template config");
    }
    Ok(Config::default())
}

/// Create a commented template config file. Refuses symlinked ancestors; the file is
/// written 0600 in a 0700 directory on Unix.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/path/to/media_migrate.log".into());

    let content = format!(
        r#"<!--
  media_migrate configuration (XML)

  <group>              one mapping: files under its <source> roots are placed on its
                       <destination> roots, tried in the order listed
  <exclude_name>       file names never processed (case-insensitive)
  <exclude_extension>  extensions never processed (".srt" or "srt")
  <exclude_dir>        directory names never descended into
  headroom             free space each destination must keep (bytes, or 500G / 2T)
  workers              concurrent transfers (1 = sequential)
  log_level            quiet | normal | info | debug
  log_file             path to log file (optional)
  preserve_metadata    copy permissions, timestamps, ownership, xattrs
  prune_empty_dirs     move mode: remove empty source folders before the run
  disable_locks        skip the run lock on filesystems without working locks
  dry_run              rewrite only: report, do not modify

  Notes:
    - CLI flags override XML values.
    - Repeated elements must be kept together (all <source> lines, then all
      <destination> lines).
-->
<config>
  <group>
    <source>/mnt/source/media</source>
    <destination>/mnt/pool1/media</destination>
    <destination>/mnt/pool2/media</destination>
  </group>
  <exclude_name>thumbs.db</exclude_name>
  <exclude_name>.ds_store</exclude_name>
  <exclude_extension>.srt</exclude_extension>
  <exclude_extension>.tmp</exclude_extension>
  <exclude_extension>.bak</exclude_extension>
  <exclude_dir>#recycle</exclude_dir>
  <headroom>500G</headroom>
  <workers>1</workers>
  <log_level>normal</log_level>
  <log_file>{suggested_log}</log_file>
  <preserve_metadata>true</preserve_metadata>
  <prune_empty_dirs>false</prune_empty_dirs>
  <disable_locks>false</disable_locks>
</config>
"#
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!(path = %path.display(), "Created template config");
    Ok(())
}

/// Create the default config if MEDIA_MIGRATE_CONFIG is not set; returns the created
/// path so the CLI can tell the user.
pub fn ensure_default_config_exists() -> Option<PathBuf> {
    if env::var_os(CONFIG_ENV).is_some() {
        return None;
    }
    let cfg_path = default_config_path().ok()?;
    if cfg_path.exists() {
        return None;
    }
    match create_template_config(&cfg_path) {
        Ok(()) => Some(cfg_path),
        Err(e) => {
            debug!(path = %cfg_path.display(), error = %e, "template config not created");
            None
        }
    }
}
