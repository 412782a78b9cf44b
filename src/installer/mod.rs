//! Executing a plan.
//!
//! The installer takes the [`Plan`] produced by the resolver and makes the
//! filesystem match it:
//!
//! 1. **Locking**: one superbuild per binary root at a time ([`BuildLock`])
//! 2. **Cleanup**: disabled dependencies lose their intermediate and install
//!    locations; an abandoned default install root is removed if empty
//! 3. **Scheduling**: tasks run as soon as their prerequisites have
//!    installed, bounded by `--max-parallel` ([`scheduler::execute`])
//! 4. **Phases**: fetch, configure, build and install run in order for
//!    each task through a [`PhaseExecutor`], with stamps recording what
//!    finished so an interrupted or repeated run resumes where it left off
//!
//! A failing phase never aborts independent branches. Every outcome ends up
//! in the [`BuildReport`], which turns into a single error naming each
//! failed dependency, its phase and its log.

use anyhow::Result;
use std::sync::Arc;

use crate::resolver::Plan;

pub mod build_lock;
pub mod cleanup;
pub mod executor;
pub mod fetch;
pub mod scheduler;
pub mod stamps;

pub use build_lock::BuildLock;
pub use cleanup::{CleanupReport, clean_plan};
pub use executor::{PhaseExecutor, SystemExecutor};
pub use scheduler::{BuildOptions, BuildReport, Outcome};

/// Clean up after disabled dependencies, then run every task in `plan`.
///
/// The returned report holds per-task outcomes; build failures do not
/// make this function fail.
///
/// # Errors
///
/// Only cleanup errors are returned here.
pub async fn run_plan<E: PhaseExecutor>(
    plan: &Plan,
    executor: Arc<E>,
    options: &BuildOptions,
) -> Result<(CleanupReport, BuildReport)> {
    let cleanup = clean_plan(plan).await?;
    if !cleanup.removed.is_empty() {
        tracing::info!("Removed {} directories of disabled dependencies", cleanup.removed.len());
    }

    tracing::info!(
        "Building {} dependencies with up to {} in parallel",
        plan.tasks.len(),
        options.max_parallel.max(1)
    );
    let report = scheduler::execute(&plan.tasks, executor, options).await;
    Ok((cleanup, report))
}
