//! Owner-only file writes
//!
//! Rendered configs and proxy credentials are readable by the privileged
//! daemon user only. Files are written to a temporary sibling and renamed
//! into place, so readers never observe a partially written file.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Permission bits for every file this module writes (rw for owner only)
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Atomically replace `path` with `contents`, readable by the owner only
pub fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    set_private_permissions(file.path())?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    tracing::debug!("Wrote {} bytes to {:?}", contents.len(), path);
    Ok(())
}

#[cfg(unix)]
fn set_private_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))
}

#[cfg(not(unix))]
fn set_private_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
