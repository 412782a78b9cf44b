//! Test utilities for superbuild
//!
//! Helpers shared by unit tests and the integration suite: local git
//! repositories, archive fixtures, a recording phase executor and
//! once-only logging setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use superbuild_cli::test_utils::{TestGit, write_tar_gz};
//!
//! let dir = tempfile::tempdir().unwrap();
//! write_tar_gz(&dir.path().join("zlib.tar.gz"), &[("zlib/zlib.h", "")]).unwrap();
//! TestGit::new(dir.path().join("repo")).init_with_files(&[("CMakeLists.txt", "")]).unwrap();
//! ```

pub mod archives;
pub mod executor;
pub mod git_helper;

pub use archives::{write_manifest, write_tar_gz, write_zip};
pub use executor::{Event, RecordingExecutor};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, tests stay silent.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
