//! Command-line interface for superbuild.
//!
//! The `superbuild` binary reads `superbuild.toml`, folds `-D KEY=VALUE`
//! definitions into the settings store kept in the binary root, and builds
//! every enabled dependency into one install root.
//!
//! # Commands
//!
//! - `build` - Fetch, configure, build and install enabled dependencies
//! - `plan` - Print the ordered plan without executing it
//! - `list` - Show dependencies with their toggle values and origins
//! - `validate` - Check the manifest and prerequisite graph
//! - `clean` - Remove build and install state of dependencies
//!
//! # Global Options
//!
//! - `-D KEY=VALUE` - Set a toggle (`SUPERBUILD_<name>`), a feature switch
//!   (`SUPERBUILD_FEATURE_<switch>`) or a build setting; remembered for
//!   later runs
//! - `-U KEY` - Forget a remembered definition
//! - `-B, --build-dir` - Binary root (default `<project>/build`)
//! - `--manifest-path` - Use this manifest instead of searching upwards
//! - `--verbose` / `--quiet` - Log level
//! - `--no-progress` - Disable progress bars and spinners
//!
//! # Example
//!
//! ```bash
//! superbuild -D CMAKE_INSTALL_PREFIX=/opt/deps -D SUPERBUILD_FEATURE_solvers=ON build
//! superbuild -D SUPERBUILD_eigen=OFF plan --format json
//! ```

mod build;
mod clean;
pub mod common;
mod list;
mod plan;
mod validate;

pub use common::{CommandContext, GlobalOptions};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::{Definition, parse_definition};

/// Output format for commands that support machine-readable output.
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripts and other tools
    Json,
}

/// Main CLI application structure for superbuild.
#[derive(Parser)]
#[command(
    name = "superbuild",
    about = "Build third-party dependencies into one install root",
    version,
    author,
    long_about = "superbuild fetches, configures, builds and installs the third-party \
                  libraries declared in superbuild.toml, in dependency order and in parallel."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging).
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the manifest file (superbuild.toml).
    ///
    /// By default superbuild searches the current directory and its parents.
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,

    /// Binary root holding sources, build trees, stamps and cached settings.
    #[arg(short = 'B', long = "build-dir", global = true, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Define a toggle, feature switch or build setting (`KEY[:TYPE]=VALUE`).
    ///
    /// Definitions are remembered in the binary root and apply to later
    /// runs until changed or unset with `-U`.
    #[arg(
        short = 'D',
        global = true,
        value_name = "KEY=VALUE",
        value_parser = parse_definition,
        action = clap::ArgAction::Append
    )]
    definitions: Vec<Definition>,

    /// Forget a remembered definition.
    #[arg(short = 'U', global = true, value_name = "KEY", action = clap::ArgAction::Append)]
    unset: Vec<String>,

    /// Disable progress bars and spinners.
    ///
    /// `SUPERBUILD_NO_PROGRESS` has the same effect.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, configure, build and install every enabled dependency.
    Build(build::BuildCommand),

    /// Print the ordered build plan without executing anything.
    Plan(plan::PlanCommand),

    /// List dependencies with their toggle values.
    List(list::ListCommand),

    /// Validate superbuild.toml and the prerequisite graph.
    Validate(validate::ValidateCommand),

    /// Remove the build and install state of dependencies.
    Clean(clean::CleanCommand),
}

impl Cli {
    /// Install logging and run the selected command.
    ///
    /// # Errors
    ///
    /// Whatever the command returns.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());
        let options = self.global_options();

        match self.command {
            Commands::Build(cmd) => cmd.execute(options).await,
            Commands::Plan(cmd) => cmd.execute(options).await,
            Commands::List(cmd) => cmd.execute(options).await,
            Commands::Validate(cmd) => cmd.execute(options).await,
            Commands::Clean(cmd) => cmd.execute(options).await,
        }
    }

    /// Log level implied by `--verbose` / `--quiet`.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Options shared by every subcommand.
    #[must_use]
    pub fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            manifest_path: self.manifest_path.clone(),
            binary_dir: self.build_dir.clone(),
            definitions: self.definitions.clone(),
            unsets: self.unset.clone(),
            quiet: self.quiet,
            no_progress: self.no_progress,
        }
    }
}

/// Install the global subscriber; `RUST_LOG` wins over `level`.
fn init_logging(level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
