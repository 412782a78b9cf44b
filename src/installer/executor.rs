//! Phase execution.
//!
//! The scheduler decides *when* a phase runs; a [`PhaseExecutor`] decides
//! *how*. [`SystemExecutor`] is the real one: it downloads and extracts
//! archives, clones repositories, runs the build tool and custom commands,
//! and captures their output to `<tmp>/<name>-<phase>.log`. Tests swap in
//! a recording executor to observe ordering without running anything.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::git::checkout_pinned;
use crate::installer::fetch::fetch_archive;
use crate::process::ToolCommand;
use crate::resolver::{BuildTask, Phase, Step};
use crate::utils::fs::{copy_dir, ensure_dir};

/// Runs one phase of one task.
pub trait PhaseExecutor: Send + Sync + 'static {
    /// Run every step of `phase` for `task`, in order.
    fn run_phase(&self, task: &BuildTask, phase: Phase) -> impl Future<Output = Result<()>> + Send;
}

/// Executes phases against the real filesystem, network and tools.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    /// Base for relative archive paths (the project directory)
    base_dir: PathBuf,
}

impl SystemExecutor {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    async fn run_step(&self, task: &BuildTask, step: &Step, log: &Path) -> Result<()> {
        match step {
            Step::DownloadArchive {
                url,
                scratch,
                destination,
            } => fetch_archive(url, scratch, destination, &self.base_dir, &task.name).await,
            Step::GitCheckout {
                address,
                revision,
                destination,
            } => checkout_pinned(address, revision, destination, &task.name, Some(log)).await,
            Step::Command {
                program,
                args,
                cwd,
                env,
            } => {
                ensure_dir(cwd)?;
                ToolCommand::new(program.clone())
                    .args(args.iter().cloned())
                    .current_dir(cwd)
                    .envs(env.iter().map(|(k, v)| (k.clone(), v.clone())))
                    .with_context(task.name.clone())
                    .log_to(log)
                    .execute_success()
                    .await
            }
            Step::CopyTree {
                from,
                to,
            } => {
                let (from, to) = (from.clone(), to.clone());
                tokio::task::spawn_blocking(move || copy_dir(&from, &to))
                    .await
                    .context("spawn_blocking panicked")?
            }
        }
    }
}

impl PhaseExecutor for SystemExecutor {
    async fn run_phase(&self, task: &BuildTask, phase: Phase) -> Result<()> {
        let log = task.layout.log_file(&task.name, phase);
        ensure_dir(&task.layout.tmp_dir)?;
        match tokio::fs::remove_file(&log).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to reset log {}", log.display()));
            }
        }

        for step in task.steps(phase) {
            tracing::debug!("({}) {}: {}", task.name, phase, step.describe());
            self.run_step(task, step, &log)
                .await
                .with_context(|| format!("{} step '{}' failed", phase, step.describe()))?;
        }
        Ok(())
    }
}
