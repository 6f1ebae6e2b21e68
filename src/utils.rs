use std::fs;
use std::path::{Component, Path};

use crate::classify::INTERNAL_PREFIX;

/// Quick writable probe: create and remove a small file in `dir`.
/// Uses create_new to avoid clobbering existing files.
pub(crate) fn is_writable_probe(dir: &Path) -> std::io::Result<()> {
    let probe = dir.join(format!("{INTERNAL_PREFIX}probe.{}", std::process::id()));
    fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&probe)?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

/// Short name for a rewrite root, used in per-run log file names.
/// `/mnt/<pool>/...` yields `<pool>`; anything else its last component.
pub fn pool_name(root: &Path) -> String {
    let normal: Vec<_> = root
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if normal.len() >= 2 && normal[0] == "mnt" {
        return normal[1].clone();
    }
    normal.last().cloned().unwrap_or_else(|| "root".into())
}
