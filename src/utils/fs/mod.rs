//! Filesystem helpers: atomic writes and idempotent directory operations.

pub mod atomic;
pub mod dirs;

pub use atomic::{atomic_write, safe_write};
pub use dirs::{
    copy_dir, ensure_dir, is_empty_dir, move_dir_contents, remove_dir_all, remove_dir_if_empty,
};
