//! I/O helper utilities.
//!
//! Provides small adapters to enrich io::Error with actionable context/hints,
//! usable with map_err in both io::Result and anyhow::Result code paths.
//!
//! Usage:
//!   // in functions returning anyhow::Result<_>
//!   fs::create_dir_all(dir).map_err(io_error_with_help("create dir", dir))?;
//!
//!   // in functions returning io::Result<_>
//!   File::open(p).map_err(io_error_with_help_io("open file", p))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Platform hint for a raw OS error code, if we know one.
fn os_hint(code: i32) -> Option<&'static str> {
    #[cfg(unix)]
    {
        let hint = match code {
            libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions.",
            libc::EXDEV => "cross-filesystem; atomic rename not possible.",
            libc::EBUSY => "resource busy; ensure no other process is writing.",
            libc::ENOENT => "path not found; it may have been removed during the run.",
            libc::EEXIST => "already exists; a previous run may have left it behind.",
            libc::ENOSPC => "insufficient space on device.",
            libc::EDQUOT => "disk quota exceeded.",
            libc::EROFS => "read-only filesystem; cannot write here.",
            libc::EIO => "low-level I/O error; check the device and cabling.",
            libc::ELOOP => "too many symbolic link levels (ELOOP); possible symlink cycle.",
            libc::ENAMETOOLONG => "filename or path too long; shorten path segments.",
            libc::EMFILE => "process file descriptor limit reached; close files or raise limits.",
            _ => return None,
        };
        Some(hint)
    }
    #[cfg(windows)]
    {
        let hint = match code {
            5 => "access denied; check permissions.",
            17 => "not same device; cross-filesystem move.",
            32 => "sharing violation; file is in use.",
            2 | 3 => "path not found; it may have been removed during the run.",
            80 | 183 => "already exists; a previous run may have left it behind.",
            112 => "insufficient disk space.",
            19 => "write protected / read-only media.",
            206 => "filename or path too long (MAX_PATH exceeded).",
            _ => return None,
        };
        Some(hint)
    }
}

fn kind_hint(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions."),
        io::ErrorKind::NotFound => Some("path not found; it may have been removed during the run."),
        io::ErrorKind::AlreadyExists => Some("already exists; remove or choose a unique name."),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            Some("busy/timed out; retry after the current write finishes.")
        }
        _ => None,
    }
}

/// Format a human-friendly message with op/path plus platform-aware hints.
fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    match e.raw_os_error() {
        Some(code) => {
            if let Some(hint) = os_hint(code) {
                msg.push_str(" - ");
                msg.push_str(hint);
            }
            msg.push_str(&format!(" [os code: {code}]"));
        }
        None => {
            if let Some(hint) = kind_hint(e.kind()) {
                msg.push_str(" - ");
                msg.push_str(hint);
            }
        }
    }
    msg
}

/// Adapter for anyhow::Result code.
/// Returns a closure suitable for `.map_err(...)` that converts io::Error -> anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

/// Adapter for io::Result code (when the surrounding function returns io::Result).
/// Preserves the original ErrorKind.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_keeps_kind_and_path() {
        let p = Path::new("/nowhere/file.bin");
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let wrapped = io_error_with_help_io("open source", p)(err);
        assert_eq!(wrapped.kind(), io::ErrorKind::NotFound);
        let msg = wrapped.to_string();
        assert!(msg.contains("open source '/nowhere/file.bin'"));
        assert!(msg.contains("path not found"));
    }

    #[cfg(unix)]
    #[test]
    fn raw_os_codes_get_hints() {
        let p = Path::new("/full");
        let err = io::Error::from_raw_os_error(libc::ENOSPC);
        let msg = io_error_with_help("write", p)(err).to_string();
        assert!(msg.contains("insufficient space"));
        assert!(msg.contains(&format!("[os code: {}]", libc::ENOSPC)));
    }
}
