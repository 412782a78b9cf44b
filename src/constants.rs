//! Global constants used throughout the superbuild codebase.
//!
//! File names, reserved prefixes, lock timing and parallelism defaults live
//! here so that the planner, the installer and the CLI agree on them.

use std::time::Duration;

/// Name of the dependency declaration file searched for by the CLI.
pub const MANIFEST_FILE: &str = "superbuild.toml";

/// Settings store written into the binary root.
pub const SETTINGS_FILE: &str = "_superbuild-cache.toml";

/// Lock file guarding a binary root against concurrent runs.
pub const LOCK_FILE: &str = ".superbuild.lock";

/// Default binary root, relative to the directory holding the manifest.
pub const DEFAULT_BINARY_DIR: &str = "build";

/// Directory (under the binary root) that receives fetched sources.
pub const SOURCES_DIR: &str = "_sources";

/// Default install root, relative to the directory holding the manifest.
pub const DEFAULT_INSTALL_DIR: &str = "install";

/// Prefix of per-dependency toggles (`SUPERBUILD_<name>`).
pub const TOGGLE_PREFIX: &str = "SUPERBUILD_";

/// Prefix of feature switches (`SUPERBUILD_FEATURE_<switch>`).
pub const FEATURE_PREFIX: &str = "SUPERBUILD_FEATURE_";

/// Definition controlling the build-tool parallel level.
pub const BUILD_JOBS_KEY: &str = "SUPERBUILD_BUILD_JOBS";

/// Environment variable disabling progress indicators.
pub const NO_PROGRESS_ENV: &str = "SUPERBUILD_NO_PROGRESS";

/// Build mode used when the operator does not pick one.
pub const DEFAULT_BUILD_TYPE: &str = "Release";

/// Parallel level handed to the build tool on Linux makefile generators.
pub const DEFAULT_BUILD_JOBS: usize = 4;

/// Dependency names that would collide with files in the binary root.
pub const RESERVED_NAMES: &[&str] = &["BUILD_JOBS"];

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Used when `available_parallelism` cannot be determined.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default number of dependencies built concurrently.
#[must_use]
pub fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_CORE_COUNT)
}
