//! Error handling for superbuild
//!
//! Two layers, following the same split everywhere in the crate:
//! - [`SuperbuildError`] enumerates every failure the orchestrator knows how to
//!   describe precisely (declaration errors, graph errors, fetch and tool
//!   failures, settings problems).
//! - [`ErrorContext`] wraps an error with optional details and a suggestion
//!   for the operator. [`user_friendly_error`] builds one from any
//!   [`anyhow::Error`] and is what the binary prints before exiting.
//!
//! Library code returns `anyhow::Result` and attaches context with
//! `.with_context(..)`; the typed variants are recovered by downcasting.
//!
//! # Examples
//!
//! ```rust,no_run
//! use superbuild_cli::core::{SuperbuildError, user_friendly_error};
//!
//! let error = SuperbuildError::CircularDependency {
//!     chain: "a → b → a".to_string(),
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for superbuild operations
///
/// Variants fall into four groups matching the failure taxonomy of a run:
/// declaration errors are fatal before anything executes, fetch and tool
/// errors halt one dependency (and its dependents), and filesystem errors
/// surface from cleanup and staging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuperbuildError {
    /// A dependency entry is malformed (missing name, contradictory locator, ...)
    #[error("Invalid dependency specification for '{name}': {reason}")]
    InvalidDependency {
        /// Name of the entry, or its position when the name is missing
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two entries share a name
    #[error("Dependency '{name}' is declared more than once")]
    DuplicateDependency {
        /// The duplicated name
        name: String,
    },

    /// A prerequisite names a dependency that is not declared
    #[error("Dependency '{name}' requires unknown prerequisite '{prerequisite}'")]
    UnknownPrerequisite {
        /// The dependent
        name: String,
        /// The missing prerequisite
        prerequisite: String,
        /// Closest declared name, if any is similar enough
        suggestion: Option<String>,
    },

    /// A dependency refers to a feature switch that is not declared
    #[error("Dependency '{name}' refers to unknown feature switch '{feature}'")]
    UnknownFeature {
        /// The dependency
        name: String,
        /// The undeclared switch
        feature: String,
    },

    /// Prerequisites form a cycle
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// The cycle, rendered as `a → b → a`
        chain: String,
    },

    /// An enabled dependency needs a prerequisite that will not be built
    #[error("Dependency '{name}' is enabled but its prerequisite '{prerequisite}' is {state}")]
    PrerequisiteNotEnabled {
        /// The enabled dependent
        name: String,
        /// The prerequisite that is off
        prerequisite: String,
        /// Why the prerequisite is off ("disabled", "excluded by feature 'x'", ...)
        state: String,
    },

    /// No superbuild.toml could be located
    #[error("Manifest file superbuild.toml not found in current directory or any parent directory")]
    ManifestNotFound,

    /// The manifest is not valid TOML or does not match the schema
    #[error("Invalid manifest file syntax in {file}")]
    ManifestParseError {
        /// Path of the manifest
        file: String,
        /// Parser message
        reason: String,
    },

    /// The settings store in the binary root cannot be read
    #[error("Invalid settings store {file}")]
    SettingsParseError {
        /// Path of the store
        file: String,
        /// Parser message
        reason: String,
    },

    /// A `-D KEY=VALUE` definition is malformed
    #[error("Invalid definition '{definition}': {reason}")]
    InvalidDefinition {
        /// The raw definition
        definition: String,
        /// What is wrong with it
        reason: String,
    },

    /// An external program could not be started
    #[error("Required tool '{tool}' is not installed or not found in PATH")]
    ToolNotFound {
        /// Program name
        tool: String,
    },

    /// A git invocation failed
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand
        operation: String,
        /// Captured standard error
        stderr: String,
    },

    /// Cloning a repository failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// Repository address
        url: String,
        /// Captured standard error
        reason: String,
    },

    /// The pinned revision could not be checked out
    #[error("Failed to checkout reference '{reference}' in repository")]
    GitCheckoutFailed {
        /// Tag, branch or commit
        reference: String,
        /// Captured standard error
        reason: String,
    },

    /// A build-tool or custom command exited unsuccessfully
    #[error("Command '{program}' failed with {status}")]
    CommandFailed {
        /// Program that was run
        program: String,
        /// Rendered exit status
        status: String,
        /// Tail of the captured standard error
        stderr: String,
    },

    /// An archive could not be downloaded
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// Archive location
        url: String,
        /// Transport or HTTP error
        reason: String,
    },

    /// The archive extension is not one we can unpack
    #[error("Unsupported archive format: {path}")]
    UnsupportedArchive {
        /// Archive file
        path: String,
    },

    /// One or more dependencies failed to build
    #[error("Superbuild failed: {failed} dependencies failed, {blocked} blocked")]
    BuildFailed {
        /// Number of dependencies with a failed phase
        failed: usize,
        /// Number of dependents that never started
        blocked: usize,
        /// One line per failing dependency and phase
        summary: String,
    },

    /// A filesystem operation failed
    #[error("File system error: {operation}")]
    FileSystemError {
        /// What was attempted
        operation: String,
        /// Path involved
        path: String,
    },

    /// Catch-all for messages without a dedicated variant
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

/// Error wrapper carrying operator-facing details and a suggestion
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SuperbuildError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`SuperbuildError`]
    #[must_use]
    pub const fn new(error: SuperbuildError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow,
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`]
///
/// Recognizes [`SuperbuildError`] (anywhere in the chain), [`std::io::Error`]
/// and [`toml::de::Error`]; everything else is reported with its full cause
/// chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(context) = error.downcast_ref::<ErrorContext>() {
        return ErrorContext {
            error: context.error.clone(),
            suggestion: context.suggestion.clone(),
            details: context.details.clone(),
        };
    }

    for cause in error.chain() {
        if let Some(known) = cause.downcast_ref::<SuperbuildError>() {
            let mut context = create_error_context(known.clone());
            // Keep the outer context lines the caller attached
            if context.details.is_none() && error.chain().count() > 1 {
                let outer: Vec<String> = error
                    .chain()
                    .take_while(|c| c.downcast_ref::<SuperbuildError>().is_none())
                    .map(ToString::to_string)
                    .collect();
                if !outer.is_empty() {
                    context.details = Some(outer.join("\n"));
                }
            }
            return context;
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(SuperbuildError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check ownership of the binary root and the install prefix")
                .with_details(io_error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(SuperbuildError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(io_error.to_string());
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(SuperbuildError::ManifestParseError {
            file: "superbuild.toml".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax: quotes, brackets and [[dependency]] headers");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(SuperbuildError::Other {
        message,
    })
}

/// Attach the canned details and suggestion for each known variant
fn create_error_context(error: SuperbuildError) -> ErrorContext {
    match &error {
        SuperbuildError::InvalidDependency {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Each [[dependency]] needs a name and exactly one source: either `url = \"...\"` \
             or `git = \"...\"` together with `tag = \"...\"` or `rev = \"...\"`",
        ),
        SuperbuildError::DuplicateDependency {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Rename or remove one of the duplicated [[dependency]] entries"),
        SuperbuildError::UnknownPrerequisite {
            suggestion,
            ..
        } => {
            let hint = suggestion.as_ref().map_or_else(
                || "Declare the prerequisite as its own [[dependency]] entry".to_string(),
                |s| format!("Did you mean '{s}'?"),
            );
            ErrorContext::new(error.clone()).with_suggestion(hint)
        }
        SuperbuildError::UnknownFeature {
            feature,
            ..
        } => {
            let hint = format!("Declare it under [features.{feature}] with a default value");
            ErrorContext::new(error).with_suggestion(hint)
        }
        SuperbuildError::CircularDependency {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Remove one of the `depends` edges on the cycle")
            .with_details("Prerequisites must form a directed acyclic graph"),
        SuperbuildError::PrerequisiteNotEnabled {
            prerequisite,
            ..
        } => {
            let hint = format!("Enable it with -D SUPERBUILD_{prerequisite}=ON");
            ErrorContext::new(error).with_suggestion(hint)
        }
        SuperbuildError::ManifestNotFound => ErrorContext::new(error)
            .with_suggestion("Create a superbuild.toml or pass --manifest-path")
            .with_details("superbuild searches the current directory and its parents"),
        SuperbuildError::ManifestParseError {
            reason,
            ..
        } => {
            let details = reason.clone();
            ErrorContext::new(error).with_details(details)
        }
        SuperbuildError::SettingsParseError {
            file,
            reason,
        } => {
            let hint = format!("Delete {file} to start from the declared defaults");
            let details = reason.clone();
            ErrorContext::new(error).with_details(details).with_suggestion(hint)
        }
        SuperbuildError::InvalidDefinition {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Definitions look like -D KEY=VALUE, booleans accept ON/OFF"),
        SuperbuildError::ToolNotFound {
            tool,
        } => {
            let hint = match tool.as_str() {
                "cmake" => "Install CMake from https://cmake.org/download/".to_string(),
                "git" => "Install git from https://git-scm.com/".to_string(),
                other => format!("Install '{other}' or fix the step that invokes it"),
            };
            ErrorContext::new(error).with_suggestion(hint)
        }
        SuperbuildError::GitCommandError {
            stderr,
            ..
        }
        | SuperbuildError::GitCloneFailed {
            reason: stderr,
            ..
        }
        | SuperbuildError::GitCheckoutFailed {
            reason: stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check that the repository is reachable and the pinned revision exists")
        }
        SuperbuildError::CommandFailed {
            stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error).with_details(details)
        }
        SuperbuildError::DownloadFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check network access and that the archive still exists at that URL"),
        SuperbuildError::UnsupportedArchive {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Supported archives are .tar.gz, .tgz, .tar and .zip"),
        SuperbuildError::BuildFailed {
            summary,
            ..
        } => {
            let details = summary.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Inspect the phase logs, fix the cause and rerun; finished phases are skipped")
        }
        SuperbuildError::FileSystemError {
            path,
            ..
        } => {
            let details = format!("Path: {path}");
            ErrorContext::new(error).with_details(details)
        }
        SuperbuildError::Other {
            ..
        } => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(SuperbuildError::ManifestNotFound)
            .with_details("searched /tmp")
            .with_suggestion("create one");
        let rendered = ctx.to_string();
        assert!(rendered.contains("superbuild.toml not found"));
        assert!(rendered.contains("Details: searched /tmp"));
        assert!(rendered.contains("Suggestion: create one"));
    }

    #[test]
    fn test_unknown_prerequisite_suggestion() {
        let err = SuperbuildError::UnknownPrerequisite {
            name: "casadi".to_string(),
            prerequisite: "ipot".to_string(),
            suggestion: Some("ipopt".to_string()),
        };
        let ctx = user_friendly_error(err.into());
        assert_eq!(ctx.suggestion.as_deref(), Some("Did you mean 'ipopt'?"));
    }

    #[test]
    fn test_known_error_found_behind_context() {
        let result: anyhow::Result<()> = Err(SuperbuildError::ToolNotFound {
            tool: "cmake".to_string(),
        }
        .into());
        let err = result.context("configure phase of 'eigen'").unwrap_err();

        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, SuperbuildError::ToolNotFound { .. }));
        assert_eq!(ctx.details.as_deref(), Some("configure phase of 'eigen'"));
        assert!(ctx.suggestion.unwrap().contains("cmake.org"));
    }

    #[test]
    fn test_generic_error_keeps_chain() {
        let err = anyhow::anyhow!("root cause").context("outer");
        let ctx = user_friendly_error(err);
        match ctx.error {
            SuperbuildError::Other {
                message,
            } => {
                assert!(message.starts_with("outer"));
                assert!(message.contains("1: root cause"));
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }
}
