//! Exclusive lock on a binary root.
//!
//! Two superbuild processes sharing one binary root would race on the
//! settings store, the stamps and every dependency's build tree. The first
//! process to start holds `<binaryRoot>/.superbuild.lock` until it exits;
//! later ones wait with exponential backoff and give up after a timeout.
//!
//! File operations run in `spawn_blocking` so a slow filesystem cannot
//! starve the runtime's worker threads.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{
    DEFAULT_LOCK_TIMEOUT, LOCK_FILE, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS,
};

/// Held for the duration of a run; released on drop.
///
/// ```rust,no_run
/// use superbuild_cli::installer::BuildLock;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let _lock = BuildLock::acquire(Path::new("build")).await?;
/// // build...
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BuildLock {
    _file: Arc<File>,
    lock_path: PathBuf,
}

// The lock file itself is left in place: unlinking it while another process
// waits on its handle would let a third process lock a fresh inode.
impl Drop for BuildLock {
    fn drop(&mut self) {
        debug!(path = %self.lock_path.display(), "Binary root lock released");
    }
}

impl BuildLock {
    /// Lock `binary_root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Fails if the lock file cannot be created, or another process holds
    /// the lock for longer than the default timeout.
    pub async fn acquire(binary_root: &Path) -> Result<Self> {
        Self::acquire_with_timeout(binary_root, DEFAULT_LOCK_TIMEOUT).await
    }

    /// Lock `binary_root`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// See [`acquire`](Self::acquire).
    pub async fn acquire_with_timeout(binary_root: &Path, timeout: Duration) -> Result<Self> {
        tokio::fs::create_dir_all(binary_root).await.with_context(|| {
            format!("Failed to create binary root: {}", binary_root.display())
        })?;

        let lock_path = binary_root.join(LOCK_FILE);
        debug!(path = %lock_path.display(), "Waiting for binary root lock");

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        let file = Arc::new(file);

        let start = std::time::Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            if matches!(locked, Ok(true)) {
                debug!(
                    path = %lock_path.display(),
                    wait_ms = start.elapsed().as_millis(),
                    "Binary root lock acquired"
                );
                return Ok(Self {
                    _file: file,
                    lock_path,
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(anyhow::anyhow!(
            "Timeout after {:?} waiting for another superbuild run in {} to finish",
            timeout,
            binary_root.display()
        ))
    }
}
