//! Cross-platform utilities shared by the planner, installer and CLI
//!
//! - [`fs`] - atomic writes and idempotent directory operations
//! - [`platform`] - platform family detection and path expansion
//! - [`progress`] - indicatif-based progress display

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{atomic_write, copy_dir, ensure_dir, remove_dir_all, safe_write};
pub use platform::{get_git_command, is_windows, resolve_path};
pub use progress::{BuildProgress, ProgressBar};
