//! Space-aware destination selection.
//!
//! Destinations are tried in configured priority order; the first one whose live free
//! space covers the file plus the reserved headroom wins. Free space is queried on
//! every decision and never cached, so concurrent workers see each other's writes as
//! far as the filesystem reports them.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audit::Tag;
use crate::platform;

/// Source of free-byte counts for a mount point.
pub trait SpaceProbe: Send + Sync {
    fn free_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Real filesystem probe (`statvfs` / `GetDiskFreeSpaceExW`).
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn free_bytes(&self, path: &Path) -> io::Result<u64> {
        platform::free_space_bytes(path)
    }
}

pub fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;
    let f = n as f64;
    if f >= TB {
        format!("{:.1} TiB", f / TB)
    } else if f >= GB {
        format!("{:.1} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{n} B")
    }
}

pub struct DestinationSelector<'a> {
    probe: &'a dyn SpaceProbe,
    headroom: u64,
}

impl<'a> DestinationSelector<'a> {
    pub fn new(probe: &'a dyn SpaceProbe, headroom: u64) -> Self {
        Self { probe, headroom }
    }

    pub fn headroom(&self) -> u64 {
        self.headroom
    }

    /// True when `dest` can take `file_size` bytes and still keep the headroom free.
    /// A failed free-space query rejects the destination.
    pub fn accepts(&self, dest: &Path, file_size: u64) -> bool {
        let needed = file_size.saturating_add(self.headroom);
        match self.probe.free_bytes(dest) {
            Ok(free) if free >= needed => {
                debug!(dest = %dest.display(), free, needed, "destination has room");
                true
            }
            Ok(free) => {
                info!(
                    dest = %dest.display(),
                    free = %format_bytes(free),
                    needed = %format_bytes(needed),
                    "Not enough space on destination, skipping"
                );
                false
            }
            Err(e) => {
                warn!(tag = %Tag::Warning, dest = %dest.display(), error = %e, "free-space query failed; destination rejected");
                false
            }
        }
    }

    /// Position of the first acceptable destination in `candidates`, if any.
    pub fn select_index(&self, candidates: &[PathBuf], file_size: u64) -> Option<usize> {
        candidates.iter().position(|d| self.accepts(d, file_size))
    }

    /// First acceptable destination in priority order; `None` when every one is full.
    pub fn select<'c>(&self, candidates: &'c [PathBuf], file_size: u64) -> Option<&'c Path> {
        self.select_index(candidates, file_size)
            .map(|i| candidates[i].as_path())
    }
}
