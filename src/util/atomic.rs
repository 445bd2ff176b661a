//! Atomic file writing via tempfile + rename.
//!
//! Uses [`tempfile::NamedTempFile`] to write to a temporary file in the same
//! directory as the target, then atomically renames it. Readers observe either
//! the old or the new full content, never a partial write.

use std::io::{self, Write};
use std::path::Path;

/// Atomically write `content` to `path`.
///
/// The temporary file is created in the parent directory of `path` so the
/// final rename never crosses filesystems. If `path` already exists its
/// permissions are applied to the replacement.
///
/// # Errors
///
/// Returns the underlying I/O error if the parent directory doesn't exist,
/// writing fails, or the rename fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;

    let existing_permissions = std::fs::metadata(path).ok().map(|m| m.permissions());

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.flush()?;

    match existing_permissions {
        Some(permissions) => tmp.as_file().set_permissions(permissions)?,
        None => set_default_permissions(tmp.as_file())?,
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `NamedTempFile` creates files with mode 0600; new files get the usual 0644.
#[cfg(unix)]
fn set_default_permissions(file: &std::fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &std::fs::File) -> io::Result<()> {
    Ok(())
}
