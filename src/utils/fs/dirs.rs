//! Directory operations for creating, copying, and removing directories.
//!
//! Every removal here is idempotent: deleting a path that does not exist
//! succeeds, which is what dependency cleanup relies on when a disabled
//! dependency was never built.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Create `path` and its parents if missing.
///
/// # Errors
///
/// Fails if the directory cannot be created or `path` exists as a file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    let safe_path = crate::utils::platform::windows_long_path(path);

    if !safe_path.exists() {
        fs::create_dir_all(&safe_path).with_context(|| {
            let platform_help = if crate::utils::platform::is_windows() {
                "On Windows: Check that the path length is < 260 chars or that long path support is enabled"
            } else {
                "Check directory permissions and path validity"
            };

            format!("Failed to create directory: {}\n\n{}", path.display(), platform_help)
        })?;
    } else if !safe_path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }

    Ok(())
}

/// Recursively copy the contents of `src` into `dst`, creating `dst`.
///
/// Existing files in `dst` are overwritten. On unix, symbolic links are
/// recreated as links (shared-library version links in pre-built archives);
/// elsewhere they are skipped.
///
/// # Errors
///
/// Fails if `src` cannot be read or any entry cannot be written.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", src.display()))?;
        let relative = entry.path().strip_prefix(src).with_context(|| {
            format!("Entry {} escaped {}", entry.path().display(), src.display())
        })?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            ensure_dir(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = fs::read_link(link)
        .with_context(|| format!("Failed to read symlink: {}", link.display()))?;
    if target.symlink_metadata().is_ok() {
        fs::remove_file(target)
            .with_context(|| format!("Failed to replace existing file: {}", target.display()))?;
    }
    std::os::unix::fs::symlink(&pointee, target)
        .with_context(|| format!("Failed to create symlink: {}", target.display()))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> Result<()> {
    tracing::debug!("Skipping symlink {}", link.display());
    Ok(())
}

/// Remove a directory tree. Absent paths are a no-op.
///
/// # Errors
///
/// Fails if the directory exists but cannot be removed.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove directory: {}", path.display())),
    }
}

/// Returns `true` if `path` is an existing directory with no entries.
///
/// # Errors
///
/// Fails if the directory exists but cannot be listed.
pub fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries =
        fs::read_dir(path).with_context(|| format!("Failed to read directory: {}", path.display()))?;
    Ok(entries.next().is_none())
}

/// Remove `path` only when it is an empty directory.
///
/// Returns whether the directory was removed. A directory that still holds
/// anything is left untouched.
///
/// # Errors
///
/// Fails if the empty directory cannot be removed.
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if !is_empty_dir(path)? {
        return Ok(false);
    }
    fs::remove_dir(path)
        .with_context(|| format!("Failed to remove empty directory: {}", path.display()))?;
    Ok(true)
}

/// Move every entry of `src` into `dst` (created if needed).
///
/// Uses renames, so `src` and `dst` must live on the same filesystem;
/// extraction staging directories are created next to their destination
/// for that reason.
///
/// # Errors
///
/// Fails if an entry cannot be renamed.
pub fn move_dir_contents(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;
    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if target.is_dir() && !target.is_symlink() {
            remove_dir_all(&target)?;
        } else if target.symlink_metadata().is_ok() {
            fs::remove_file(&target)
                .with_context(|| format!("Failed to replace {}", target.display()))?;
        }
        fs::rename(entry.path(), &target).with_context(|| {
            format!("Failed to move {} to {}", entry.path().display(), target.display())
        })?;
    }
    Ok(())
}
