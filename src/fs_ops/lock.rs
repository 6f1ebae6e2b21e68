//! Advisory run lock.
//! Holds a sidecar file `.media_migrate.lock` inside a root so two runs never work on
//! the same tree at once (the existing-file index and the rewrite markers both assume
//! a single writer).
//!
//! - Unix: `flock(LOCK_EX)` on the sidecar's descriptor.
//! - Windows: open the sidecar without sharing; a sharing violation means "held".
//!
//! The lock is released, and the sidecar removed, when the guard drops.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

#[cfg(unix)]
use std::os::fd::AsRawFd;

use crate::classify::INTERNAL_PREFIX;

/// RAII guard held while a directory lock is active.
#[derive(Debug)]
pub struct DirLock {
    file: Option<File>,
    path: PathBuf,
}

impl DirLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            #[cfg(unix)]
            {
                // SAFETY: `file` is still open here.
                let _ = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
            }
            // Close before removing; Windows refuses to delete an open file.
            drop(file);
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_file_path(dir: &Path) -> PathBuf {
    dir.join(format!("{INTERNAL_PREFIX}lock"))
}

/// Non-blocking attempt. `Ok(None)` means another run holds the lock.
pub fn try_acquire_dir_lock(dir: &Path) -> io::Result<Option<DirLock>> {
    lock_inner(dir)
}

#[cfg(unix)]
fn lock_inner(dir: &Path) -> io::Result<Option<DirLock>> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    let path = lock_file_path(dir);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .custom_flags(libc::O_CLOEXEC)
        .mode(0o600)
        .open(&path)?;

    // SAFETY: `file` is an open descriptor for the duration of the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        trace!(path = %path.display(), "lock acquired");
        return Ok(Some(DirLock { file: Some(file), path }));
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        trace!(path = %path.display(), "lock held elsewhere");
        return Ok(None);
    }
    Err(err)
}

#[cfg(windows)]
fn lock_inner(dir: &Path) -> io::Result<Option<DirLock>> {
    use std::fs::OpenOptions;
    use std::os::windows::fs::OpenOptionsExt;

    const ERROR_SHARING_VIOLATION: i32 = 32;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    let path = lock_file_path(dir);
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .share_mode(0)
        .attributes(FILE_ATTRIBUTE_HIDDEN)
        .open(&path)
    {
        Ok(file) => {
            trace!(path = %path.display(), "lock acquired");
            Ok(Some(DirLock { file: Some(file), path }))
        }
        Err(e) if e.raw_os_error() == Some(ERROR_SHARING_VIOLATION) => {
            trace!(path = %path.display(), "lock held elsewhere");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
