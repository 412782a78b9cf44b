//! Child-process builder used for every shell-out
//!
//! Build-tool invocations (`cmake`), custom phase steps and git all go
//! through [`ToolCommand`]. It captures output, optionally appends it to a
//! per-phase log file, tags log lines with a context (the dependency name)
//! so concurrent phases can be told apart, and maps failures onto
//! [`SuperbuildError`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use superbuild_cli::process::ToolCommand;
//!
//! # async fn example() -> anyhow::Result<()> {
//! ToolCommand::new("cmake")
//!     .args(["--build", "build/zlib/build", "--parallel", "4"])
//!     .with_context("zlib")
//!     .log_to("build/zlib/tmp/zlib-build.log")
//!     .execute_success()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::core::SuperbuildError;

/// Number of trailing stderr lines kept in a [`SuperbuildError::CommandFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// Builder for one external program invocation.
///
/// Output is always captured; the environment and working directory are
/// inherited unless overridden.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    context: Option<String>,
    log_file: Option<PathBuf>,
}

impl ToolCommand {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            context: None,
            log_file: None,
        }
    }

    /// Run the program in `dir`.
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

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set several environment variables for the child.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Tag log messages with `context`, typically the dependency name.
    ///
    /// ```text
    /// (zlib) Executing command: cmake --build build/zlib/build
    /// ```
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Append the command line and its captured output to `path`.
    pub fn log_to(mut self, path: impl AsRef<Path>) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// The program this command will run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed so far.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The command line as a single display string.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn tag(&self) -> String {
        self.context.as_ref().map(|c| format!("({c}) ")).unwrap_or_default()
    }

    /// Run the command and return its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Fails only if the program cannot be started ([`SuperbuildError::ToolNotFound`]
    /// when it is missing) or the log file cannot be written.
    pub async fn execute_raw(&self) -> Result<ToolOutput> {
        let start = std::time::Instant::now();
        let tag = self.tag();
        let command_line = self.command_line();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            tracing::trace!(target: "process", "{}Setting env var: {}={}", tag, key, value);
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        tracing::debug!(target: "process", "{}Executing command: {}", tag, command_line);

        let spawned = cmd.output().await;

        let output = match spawned {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SuperbuildError::ToolNotFound {
                    tool: self.program.clone(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to execute {command_line}"));
            }
        };

        let result = ToolOutput {
            status: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.stdout.is_empty() {
            tracing::debug!(target: "process", "{}{}", tag, result.stdout.trim());
        }
        if !result.stderr.is_empty() {
            tracing::debug!(target: "process", "{}{}", tag, result.stderr.trim());
        }

        if let Some(log_file) = &self.log_file {
            self.append_log(log_file, &command_line, &result)?;
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::debug!(
                target: "process::perf",
                "{}{} took {:.2}s",
                tag,
                self.program,
                elapsed.as_secs_f64()
            );
        }

        Ok(result)
    }

    /// Run the command and fail on a non-zero exit status.
    ///
    /// # Errors
    ///
    /// Everything [`execute_raw`](Self::execute_raw) fails on, plus
    /// [`SuperbuildError::CommandFailed`] with the tail of stderr.
    pub async fn execute(self) -> Result<ToolOutput> {
        let output = self.execute_raw().await?;
        if !output.success {
            tracing::debug!(
                target: "process",
                "{}Command failed with exit code: {:?}",
                self.tag(),
                output.status
            );
            return Err(SuperbuildError::CommandFailed {
                program: self.program.clone(),
                status: output.status_display(),
                stderr: output.error_tail(STDERR_TAIL_LINES),
            }
            .into());
        }
        Ok(output)
    }

    /// Run the command and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Run the command, discarding output on success.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    fn append_log(&self, log_file: &Path, command_line: &str, output: &ToolOutput) -> Result<()> {
        if let Some(parent) = log_file.parent() {
            crate::utils::fs::ensure_dir(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;

        let cwd = self
            .current_dir
            .as_ref()
            .map_or_else(|| ".".to_string(), |d| d.display().to_string());
        writeln!(file, "$ {command_line}")?;
        writeln!(file, "# cwd: {cwd}")?;
        file.write_all(output.stdout.as_bytes())?;
        file.write_all(output.stderr.as_bytes())?;
        writeln!(file, "# exit: {}", output.status_display())?;
        Ok(())
    }
}

/// Captured result of a [`ToolCommand`].
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    /// Whether the program exited successfully
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// Human-readable exit status.
    #[must_use]
    pub fn status_display(&self) -> String {
        self.status.map_or_else(|| "signal".to_string(), |code| format!("exit code {code}"))
    }

    /// Last `lines` lines of stderr, or of stdout when stderr is empty.
    #[must_use]
    pub fn error_tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let all: Vec<&str> = source.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}
