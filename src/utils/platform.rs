//! Platform detection and path expansion
//!
//! The orchestrator changes behavior on three platform facts: whether the
//! host is macOS (deployment target propagation), whether it is Linux
//! (explicit build parallelism) and which platform families a dependency's
//! `platforms` / `prebuilt` tables refer to.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Platform family names accepted in `platforms = [...]` and `prebuilt` tables.
pub const PLATFORM_FAMILIES: &[&str] = &["unix", "windows", "macos", "linux"];

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Checks if the current platform is macOS.
#[must_use]
pub const fn is_macos() -> bool {
    cfg!(target_os = "macos")
}

/// Checks if the current platform is Linux.
#[must_use]
pub const fn is_linux() -> bool {
    cfg!(target_os = "linux")
}

/// Returns whether `family` names the platform we are running on.
///
/// `unix` matches every non-Windows host, so a macOS machine matches both
/// `unix` and `macos`.
///
/// # Examples
///
/// ```rust,no_run
/// use superbuild_cli::utils::platform::matches_family;
///
/// if matches_family("windows") {
///     println!("using the pre-built archive");
/// }
/// ```
#[must_use]
pub fn matches_family(family: &str) -> bool {
    match family {
        "windows" => is_windows(),
        "unix" => cfg!(unix),
        "macos" => is_macos(),
        "linux" => is_linux(),
        _ => false,
    }
}

/// Returns the appropriate Git command name for the current platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Returns the build-tool program name for the current platform.
#[must_use]
pub const fn get_cmake_command() -> &'static str {
    if is_windows() {
        "cmake.exe"
    } else {
        "cmake"
    }
}

/// Expands `~` and environment variables in a user-supplied path.
///
/// Used for every path-valued definition (`CMAKE_INSTALL_PREFIX`, compilers,
/// `SWIG_EXECUTABLE`) so that `-D CMAKE_INSTALL_PREFIX=~/opt/deps` does
/// what an operator expects.
///
/// # Errors
///
/// Fails when a referenced environment variable is undefined.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        let platform_vars = if is_windows() {
            "Common Windows variables: $USERPROFILE, $APPDATA, $TEMP"
        } else {
            "Common Unix variables: $HOME, $USER, $TMPDIR"
        };
        format!(
            "Failed to expand environment variables in path: {path}\n\n\
             Use $VAR or ${{VAR}} and make sure the variable is defined.\n\
             {platform_vars}"
        )
    })?;

    Ok(windows_long_path(Path::new(expanded.as_ref())))
}

/// Makes `path` absolute against `base` without touching the filesystem.
#[must_use]
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Checks if a command is available on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Prefixes long Windows paths with `\\?\` so nested build trees stay usable.
#[cfg(windows)]
pub fn windows_long_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if path_str.len() > 260 && !path_str.starts_with(r"\\?\") {
        let absolute_path = if path.is_relative() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(path)
        } else {
            path.to_path_buf()
        };

        let absolute_str = absolute_path.to_string_lossy();
        if absolute_str.len() > 260 {
            if let Some(stripped) = absolute_str.strip_prefix(r"\\") {
                PathBuf::from(format!(r"\\?\UNC\{}", stripped))
            } else {
                PathBuf::from(format!(r"\\?\{}", absolute_str))
            }
        } else {
            absolute_path
        }
    } else {
        path.to_path_buf()
    }
}

/// No-op on platforms without a path length limit.
#[cfg(not(windows))]
#[must_use]
pub fn windows_long_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}
