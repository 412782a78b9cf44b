//! superbuild - a dependency superbuild orchestrator
//!
//! A project that needs a stack of third-party libraries (solvers, linear
//! algebra, code generators) declares them once in `superbuild.toml`.
//! superbuild fetches each one, configures, builds and installs it into a
//! single install root, in dependency order and in parallel where the
//! graph allows. Every dependency has an on/off toggle whose value is
//! remembered between runs; turning one off removes what it left behind.
//!
//! # Architecture Overview
//!
//! - `superbuild.toml` declares dependencies, feature switches and custom steps
//! - `<binaryRoot>/_superbuild-cache.toml` remembers toggles and definitions
//! - The resolver turns both into a [`resolver::Plan`]: pure toggle
//!   evaluation, topological ordering and one four-phase task per enabled
//!   dependency
//! - The installer executes the plan: cleanup, scheduling, phase execution
//!   and per-phase stamps for resumable runs
//!
//! # Core Modules
//!
//! - [`cli`] - The `superbuild` command line
//! - [`config`] - Definitions, build settings and the settings store
//! - [`core`] - Error types and user-facing error rendering
//! - [`manifest`] - Manifest parsing and validation
//! - [`resolver`] - Toggle evaluation, ordering, layouts, arguments and tasks
//! - [`installer`] - Locking, cleanup, scheduling, fetching and phase execution
//! - [`git`] - Pinned repository checkouts through the system `git`
//! - [`process`] - Child processes with captured output and per-phase logs
//! - [`utils`] - Filesystem, platform and progress helpers
//!
//! # Manifest Format (superbuild.toml)
//!
//! ```toml
//! [features.solvers]
//! default = false
//!
//! [[dependency]]
//! name = "eigen"
//! url = "https://gitlab.com/libeigen/eigen/-/archive/3.4.0/eigen-3.4.0.tar.gz"
//!
//! [[dependency]]
//! name = "casadi"
//! git = "https://github.com/casadi/casadi.git"
//! tag = "3.6.5"
//! depends = ["eigen"]
//! feature = "solvers"
//! args = ["WITH_EXAMPLES=OFF"]
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! superbuild validate
//! superbuild -D SUPERBUILD_FEATURE_solvers=ON plan
//! superbuild -D CMAKE_INSTALL_PREFIX=/opt/deps build --max-parallel 2
//! superbuild -D SUPERBUILD_eigen=OFF build   # removes eigen's build and install dirs
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod resolver;

// Fetching and execution
pub mod git;
pub mod installer;
pub mod process;

// Declarations
pub mod manifest;

// Supporting modules
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
