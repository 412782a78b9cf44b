//! Build every enabled dependency.
//!
//! This is the main command: it locks the binary root, records the
//! command-line definitions in the settings store, plans the run, removes
//! what disabled dependencies left behind and drives the four phases of
//! every enabled dependency through the scheduler.
//!
//! # Examples
//!
//! ```bash
//! # Build with the remembered toggles
//! superbuild build
//!
//! # Turn a dependency off (its build and install directories are removed)
//! superbuild -D SUPERBUILD_eigen=OFF build
//!
//! # Rebuild one dependency and what it needs, ignoring stamps
//! superbuild build --only casadi --force
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use super::common::{CommandContext, GlobalOptions};
use crate::installer::{BuildLock, BuildOptions, Outcome, SystemExecutor, run_plan};
use crate::utils::progress::is_progress_disabled;

/// Command to build all enabled dependencies.
#[derive(Args, Debug, Default)]
pub struct BuildCommand {
    /// Ignore stamps and run every phase again
    #[arg(short, long)]
    force: bool,

    /// Build only these dependencies and their prerequisites
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    only: Vec<String>,

    /// Maximum number of dependencies built at once (default: CPU cores)
    #[arg(long, value_name = "NUM")]
    max_parallel: Option<usize>,
}

impl BuildCommand {
    /// Execute the build.
    ///
    /// The settings store is saved even when a dependency fails, so the
    /// next run starts from the same toggles.
    ///
    /// # Errors
    ///
    /// Configuration and plan errors, a held lock, and
    /// [`SuperbuildError::BuildFailed`](crate::core::SuperbuildError::BuildFailed)
    /// summarizing every failed and blocked dependency.
    pub async fn execute(self, options: GlobalOptions) -> Result<()> {
        let ctx = CommandContext::load(&options)?;
        let _lock = BuildLock::acquire(&ctx.binary_root).await?;

        let (store, mut plan) = ctx.plan(&options)?;
        if !self.only.is_empty() {
            plan.restrict_to(&self.only)?;
        }

        let build_options = BuildOptions {
            max_parallel: self
                .max_parallel
                .unwrap_or_else(crate::constants::default_max_parallel),
            force: self.force,
            progress: !options.quiet && !options.no_progress && !is_progress_disabled(),
        };

        let executor = Arc::new(SystemExecutor::new(&ctx.project_dir));
        let result = run_plan(&plan, executor, &build_options).await;
        store.save()?;
        let (cleanup, report) = result?;

        if !options.quiet {
            for path in &cleanup.removed {
                println!("{} {}", "Removed".yellow(), path.display());
            }
            for path in &cleanup.kept_stale {
                println!("{} {} (not empty)", "Kept".yellow(), path.display());
            }
            for (name, outcome) in &report.outcomes {
                match outcome {
                    Outcome::Installed {
                        ran,
                        ..
                    } if ran.is_empty() => println!("{} {}", "Up to date".dimmed(), name),
                    Outcome::Installed {
                        ..
                    } => println!("{} {}", "Installed".green(), name),
                    Outcome::Failed {
                        phase,
                        ..
                    } => println!("{} {} ({})", "Failed".red(), name, phase),
                    Outcome::Blocked {
                        by,
                    } => println!("{} {} (needs {})", "Blocked".red(), name, by),
                }
            }
        }

        let report = report.into_result()?;
        if !options.quiet {
            let count = report.installed().count();
            println!(
                "{} {} dependencies into {}",
                "Finished".green().bold(),
                count,
                plan.paths.install_root.display()
            );
        }
        Ok(())
    }
}
