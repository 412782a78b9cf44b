//! Removal of artifacts that no longer belong to the run.
//!
//! Two cases:
//! - A dependency whose toggle is off has its intermediate location
//!   (`<binaryRoot>/<name>`) and its install location removed. Removing an
//!   absent path is a no-op, so re-running with the same toggles is cheap.
//! - When the install root moved away from the default, each enabled
//!   dependency's directory under the default root, and then the default
//!   root itself, are removed only if empty. Anything still holding files
//!   is left alone and reported.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};

use crate::resolver::{DisabledDependency, Plan};
use crate::utils::fs::{remove_dir_all, remove_dir_if_empty};

/// What a cleanup pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Directories removed for disabled dependencies (only those that existed)
    pub removed: Vec<PathBuf>,
    /// Empty directories under the default install root that were removed
    pub removed_stale: Vec<PathBuf>,
    /// Default-root directories left in place because they hold files
    pub kept_stale: Vec<PathBuf>,
}

/// Remove the intermediate and install locations of every disabled
/// dependency, concurrently.
///
/// # Errors
///
/// Fails if an existing directory cannot be removed.
pub async fn clean_disabled(disabled: &[DisabledDependency]) -> Result<Vec<PathBuf>> {
    let targets: Vec<PathBuf> = disabled
        .iter()
        .flat_map(|dep| [dep.layout.binary_dir.clone(), dep.layout.install_dir.clone()])
        .collect();
    remove_existing(targets).await
}

/// Remove every existing directory in `targets`.
///
/// # Errors
///
/// Fails if an existing directory cannot be removed.
pub async fn remove_existing(targets: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let removals = targets.into_iter().map(|path| async move {
        tokio::task::spawn_blocking(move || -> Result<Option<PathBuf>> {
            if path.symlink_metadata().is_err() {
                return Ok(None);
            }
            remove_dir_all(&path)?;
            tracing::info!("Removed {}", path.display());
            Ok(Some(path))
        })
        .await
        .context("spawn_blocking panicked")?
    });
    let removed = try_join_all(removals).await?;
    Ok(removed.into_iter().flatten().collect())
}

/// Remove empty per-dependency directories under the default install root,
/// then the root itself if that leaves it empty.
///
/// Returns `(removed, kept)`.
///
/// # Errors
///
/// Fails if an empty directory cannot be removed.
pub fn clean_stale_default_root(
    stale_dirs: &[PathBuf],
    default_root: &Path,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut removed = Vec::new();
    let mut kept = Vec::new();

    for dir in stale_dirs {
        if !dir.exists() {
            continue;
        }
        if remove_dir_if_empty(dir)? {
            tracing::debug!("Removed empty {}", dir.display());
            removed.push(dir.clone());
        } else {
            tracing::warn!(
                "Leaving {} in place: the install root moved but it still holds files",
                dir.display()
            );
            kept.push(dir.clone());
        }
    }

    if !stale_dirs.is_empty() && default_root.exists() {
        if remove_dir_if_empty(default_root)? {
            tracing::info!("Removed empty default install root {}", default_root.display());
            removed.push(default_root.to_path_buf());
        } else {
            tracing::warn!(
                "Default install root {} still holds files and was kept",
                default_root.display()
            );
            kept.push(default_root.to_path_buf());
        }
    }

    Ok((removed, kept))
}

/// Run both cleanup passes for `plan`.
///
/// # Errors
///
/// Filesystem errors from either pass.
pub async fn clean_plan(plan: &Plan) -> Result<CleanupReport> {
    let removed = clean_disabled(&plan.disabled).await?;

    let stale = plan.stale_default_dirs.clone();
    let default_root = plan.paths.default_install_root.clone();
    let (removed_stale, kept_stale) =
        tokio::task::spawn_blocking(move || clean_stale_default_root(&stale, &default_root))
            .await
            .context("spawn_blocking panicked")??;

    Ok(CleanupReport {
        removed,
        removed_stale,
        kept_stale,
    })
}
