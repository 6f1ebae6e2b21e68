//! Metadata preservation.
//! - Timestamps (atime, mtime) and permission bits from source -> dest.
//! - Ownership (Unix; needs privileges, silently skipped otherwise).
//! - Extended attributes with the `xattrs` feature. On Linux POSIX ACLs live in the
//!   `system.posix_acl_*` attributes and travel with them.
//!
//! Everything here is best-effort: failures are logged and the copy stands.
//! Order matters: xattrs and ownership first (they may need write access and can reset
//! set-id bits), then mode, then times last so nothing bumps mtime afterwards.

use filetime::{FileTime, set_file_times};
use std::fs;
use std::path::Path;
use tracing::{trace, warn};

/// Apply every preservable attribute of `src` (already stat'ed as `src_meta`) to `dest`.
pub fn preserve_all(src: &Path, dest: &Path, src_meta: &fs::Metadata) {
    preserve_xattrs(src, dest);
    preserve_ownership(dest, src_meta);
    preserve_metadata(dest, src_meta);
}

/// Preserve permissions and timestamps on `dest` using already-fetched `src_meta`.
pub fn preserve_metadata(dest: &Path, src_meta: &fs::Metadata) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = src_meta.permissions().mode() & 0o7777;
        if let Err(e) = fs::set_permissions(dest, fs::Permissions::from_mode(mode)) {
            warn!(path = %dest.display(), mode = format!("{mode:o}"), error = %e, "failed to set permissions on destination");
        }
    }
    #[cfg(windows)]
    {
        let ro = src_meta.permissions().readonly();
        if let Ok(meta) = fs::metadata(dest) {
            let mut perms = meta.permissions();
            perms.set_readonly(ro);
            if let Err(e) = fs::set_permissions(dest, perms) {
                warn!(path = %dest.display(), readonly = ro, error = %e, "failed to set readonly attribute on destination");
            }
        }
    }

    let at = FileTime::from_last_access_time(src_meta);
    let mt = FileTime::from_last_modification_time(src_meta);
    match set_file_times(dest, at, mt) {
        Ok(()) => trace!(path = %dest.display(), "set atime/mtime on destination"),
        Err(e) => warn!(path = %dest.display(), error = %e, "failed to set atime/mtime on destination"),
    }
}

/// Copy uid/gid. Unprivileged processes can usually only keep their own ids, so
/// EPERM is expected and only traced.
pub fn preserve_ownership(dest: &Path, src_meta: &fs::Metadata) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let (uid, gid) = (src_meta.uid(), src_meta.gid());
        match std::os::unix::fs::chown(dest, Some(uid), Some(gid)) {
            Ok(()) => trace!(path = %dest.display(), uid, gid, "preserved ownership"),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                trace!(path = %dest.display(), uid, gid, "ownership not preserved (unprivileged)")
            }
            Err(e) => warn!(path = %dest.display(), uid, gid, error = %e, "failed to set ownership on destination"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (dest, src_meta);
    }
}

/// Copy extended attributes (requires the `xattrs` feature; otherwise a no-op).
pub fn preserve_xattrs(src: &Path, dest: &Path) {
    #[cfg(feature = "xattrs")]
    {
        if !xattr::SUPPORTED_PLATFORM {
            return;
        }
        let names = match xattr::list(src) {
            Ok(names) => names,
            Err(e) => {
                warn!(src = %src.display(), error = %e, "failed to list xattrs; continuing without them");
                return;
            }
        };
        for name in names {
            let shown = name.to_string_lossy().into_owned();
            let value = match xattr::get(src, &name) {
                Ok(v) => v.unwrap_or_default(),
                Err(e) => {
                    warn!(src = %src.display(), xattr = %shown, error = %e, "failed to read xattr from source");
                    continue;
                }
            };
            match xattr::set(dest, &name, &value) {
                Ok(()) => trace!(dest = %dest.display(), xattr = %shown, size = value.len(), "preserved xattr"),
                Err(e) => warn!(dest = %dest.display(), xattr = %shown, error = %e, "failed to set xattr on destination"),
            }
        }
    }
    #[cfg(not(feature = "xattrs"))]
    {
        let _ = (src, dest);
    }
}
