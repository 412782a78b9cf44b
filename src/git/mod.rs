//! Git operations for repository-pinned dependencies
//!
//! Superbuild shells out to the system `git` binary rather than linking a
//! git library, so whatever credentials, proxies and SSH configuration the
//! operator already has keep working. Commands are built with [`GitCommand`]
//! on top of [`ToolCommand`](crate::process::ToolCommand), and failures are
//! mapped to the git variants of [`SuperbuildError`].
//!
//! The one high-level operation is [`checkout_pinned`]: make a directory
//! hold the repository at exactly one tag or commit, with submodules.
//!
//! ```rust,no_run
//! use superbuild_cli::git::checkout_pinned;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! checkout_pinned(
//!     "https://github.com/madler/zlib.git",
//!     "v1.3.1",
//!     Path::new("build/_sources/zlib"),
//!     "zlib",
//!     None,
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::SuperbuildError;
use crate::process::ToolCommand;
use crate::utils::fs::{ensure_dir, remove_dir_all};
use crate::utils::platform::get_git_command;

/// Builder for one git invocation.
///
/// Runs as `git -C <dir> <args...>` when a directory is set, with terminal
/// prompts disabled so a missing credential fails instead of hanging.
#[derive(Debug, Default)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
    log_file: Option<PathBuf>,
    clone_url: Option<String>,
}

impl GitCommand {
    /// Create an empty git command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run inside `dir` (passed as `-C dir`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Tag log output with the dependency name.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Append output to a phase log.
    pub fn log_to(mut self, path: Option<&Path>) -> Self {
        self.log_file = path.map(Path::to_path_buf);
        self
    }

    fn to_tool_command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(get_git_command()).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = &self.current_dir {
            cmd = cmd.arg("-C").arg(dir.display().to_string());
        }
        cmd = cmd.args(self.args.iter().cloned());
        if let Some(ctx) = &self.context {
            cmd = cmd.with_context(ctx.clone());
        }
        if let Some(log) = &self.log_file {
            cmd = cmd.log_to(log);
        }
        cmd
    }

    /// Execute and return stdout on success.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::GitCloneFailed`] for a failed clone,
    /// [`SuperbuildError::GitCheckoutFailed`] for a failed checkout,
    /// [`SuperbuildError::GitCommandError`] otherwise, and
    /// [`SuperbuildError::ToolNotFound`] when git is not installed.
    pub async fn execute(self) -> Result<String> {
        let output = self.to_tool_command().execute_raw().await?;
        if output.success {
            return Ok(output.stdout);
        }

        let stderr = if output.stderr.is_empty() {
            output.stdout.clone()
        } else {
            output.stderr.clone()
        };
        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let error = match operation.as_str() {
            "clone" => SuperbuildError::GitCloneFailed {
                url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                reason: stderr,
            },
            "checkout" => SuperbuildError::GitCheckoutFailed {
                reference: self.args.last().cloned().unwrap_or_default(),
                reason: stderr,
            },
            _ => SuperbuildError::GitCommandError {
                operation,
                stderr,
            },
        };
        Err(error.into())
    }

    /// Execute and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        Ok(self.execute().await?.trim().to_string())
    }

    /// Execute, discarding output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

// Convenience builders for the operations superbuild needs

impl GitCommand {
    /// `git clone --recurse-submodules <url> <target>`
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args([
            "clone",
            "--recurse-submodules",
            url,
            &target.as_ref().display().to_string(),
        ]);
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Fetch every tag and branch from origin.
    #[must_use]
    pub fn fetch() -> Self {
        Self::new().args(["fetch", "--tags", "--force", "origin"])
    }

    /// Detached checkout of a tag or commit.
    #[must_use]
    pub fn checkout(reference: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", reference])
    }

    /// Bring submodules in line with the checked-out revision.
    #[must_use]
    pub fn submodule_update() -> Self {
        Self::new().args(["submodule", "update", "--init", "--recursive"])
    }

    /// Resolve `HEAD` to a commit hash.
    #[must_use]
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// Read the URL of `origin`.
    #[must_use]
    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }
}

/// Make `target` a checkout of `url` at exactly `revision`, with submodules.
///
/// An existing clone of the same URL is reused (fetch, then checkout);
/// anything else at `target` is replaced by a fresh clone.
///
/// # Errors
///
/// Returns the git error for the first failing step.
pub async fn checkout_pinned(
    url: &str,
    revision: &str,
    target: &Path,
    context: &str,
    log: Option<&Path>,
) -> Result<()> {
    let reuse = target.join(".git").exists()
        && GitCommand::remote_url()
            .current_dir(target)
            .with_context(context)
            .execute_stdout()
            .await
            .is_ok_and(|origin| origin == url);

    if reuse {
        tracing::debug!(target: "git", "({}) Reusing existing clone at {}", context, target.display());
        GitCommand::fetch()
            .current_dir(target)
            .with_context(context)
            .log_to(log)
            .execute_success()
            .await
            .with_context(|| format!("Failed to update existing clone of {url}"))?;
    } else {
        remove_dir_all(target)?;
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        GitCommand::clone(url, target).with_context(context).log_to(log).execute_success().await?;
    }

    GitCommand::checkout(revision)
        .current_dir(target)
        .with_context(context)
        .log_to(log)
        .execute_success()
        .await?;

    GitCommand::submodule_update()
        .current_dir(target)
        .with_context(context)
        .log_to(log)
        .execute_success()
        .await?;

    if let Ok(commit) =
        GitCommand::current_commit().current_dir(target).with_context(context).execute_stdout().await
    {
        tracing::debug!(target: "git", "({}) {} checked out at {}", context, revision, commit);
    }

    Ok(())
}
