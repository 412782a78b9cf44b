//! Integration test suite for superbuild
//!
//! End-to-end scenarios over the public library API and the `superbuild`
//! binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **planning**: Plan construction from manifests and definitions
//! - **scheduling**: Ordering and concurrency with a recording executor
//! - **cleanup**: Disabled dependencies and moved install roots
//! - **runs**: Real runs with local archives, git repositories and shell steps (unix)
//! - **cli**: The `superbuild` binary

use std::path::{Path, PathBuf};

use superbuild_cli::cli::{CommandContext, GlobalOptions};
use superbuild_cli::config::{Definition, SettingsStore};
use superbuild_cli::resolver::Plan;
use superbuild_cli::test_utils::write_manifest;

mod cleanup;
mod cli;
mod planning;
#[cfg(unix)]
mod runs;
mod scheduling;

/// A project directory holding a manifest.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub manifest_path: PathBuf,
}

impl Project {
    pub fn new(manifest: &str) -> Self {
        superbuild_cli::test_utils::init_test_logging(None);
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = write_manifest(dir.path(), manifest).unwrap();
        Self {
            dir,
            manifest_path,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn rewrite(&self, manifest: &str) {
        write_manifest(self.path(), manifest).unwrap();
    }

    pub fn context(&self) -> CommandContext {
        CommandContext::from_manifest_path(&self.manifest_path, None).unwrap()
    }

    /// Plan with `definitions` applied, the way a command invocation would.
    pub fn plan(&self, definitions: &[&str]) -> anyhow::Result<(SettingsStore, Plan)> {
        let options = GlobalOptions {
            definitions: definitions.iter().map(|d| d.parse::<Definition>().unwrap()).collect(),
            ..GlobalOptions::default()
        };
        self.context().plan(&options)
    }
}
