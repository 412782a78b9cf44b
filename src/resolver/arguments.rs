//! Configure-argument assembly.
//!
//! Each dependency's configure step receives, in order:
//! 1. its install location (`CMAKE_INSTALL_PREFIX`)
//! 2. the build mode, for single-configuration generators only
//! 3. compilers, compiler flags and per-mode flags
//! 4. the macOS deployment target, on macOS
//! 5. the code-generation helper, when one is configured
//! 6. the install locations of its prerequisites (`CMAKE_PREFIX_PATH`)
//! 7. its own `args` from the manifest
//!
//! Setting a key that is already present replaces the earlier entry, so the
//! last write wins and a dependency can override anything propagated to it.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::{BuildSettings, TargetOs};
use crate::config::settings::{
    BUILD_TYPE_KEY, C_COMPILER_KEY, C_FLAGS_KEY, CODEGEN_EXECUTABLE_KEY, CXX_COMPILER_KEY,
    CXX_FLAGS_KEY, INSTALL_PREFIX_KEY, OSX_DEPLOYMENT_TARGET_KEY,
};
use crate::core::SuperbuildError;
use crate::resolver::layout::InstallLayout;

pub const PREFIX_PATH_KEY: &str = "CMAKE_PREFIX_PATH";

/// One `-DKEY[:TYPE]=VALUE` argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolArg {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: String,
}

impl ToolArg {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: None,
            value: value.into(),
        }
    }

    /// Parse `KEY=VALUE` or `KEY:TYPE=VALUE`.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::InvalidDefinition`] if there is no `=` or the key is empty.
    pub fn parse(raw: &str) -> Result<Self, SuperbuildError> {
        let invalid = || SuperbuildError::InvalidDefinition {
            definition: raw.to_string(),
            reason: "expected KEY=VALUE or KEY:TYPE=VALUE".to_string(),
        };
        let (lhs, value) = raw.split_once('=').ok_or_else(invalid)?;
        let (key, kind) = match lhs.split_once(':') {
            Some((key, kind)) => (key, Some(kind.to_string())),
            None => (lhs, None),
        };
        if key.trim().is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            key: key.trim().to_string(),
            kind,
            value: value.to_string(),
        })
    }

    /// Command-line form, `-DKEY=VALUE` or `-DKEY:TYPE=VALUE`.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.kind {
            Some(kind) => format!("-D{}:{}={}", self.key, kind, self.value),
            None => format!("-D{}={}", self.key, self.value),
        }
    }
}

impl fmt::Display for ToolArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Ordered arguments with last-write-wins semantics per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArgumentList {
    args: Vec<ToolArg>,
}

impl ArgumentList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `arg`, dropping any earlier argument with the same key.
    pub fn set(&mut self, arg: ToolArg) {
        self.args.retain(|existing| existing.key != arg.key);
        self.args.push(arg);
    }

    /// Value of `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find(|a| a.key == key).map(|a| a.value.as_str())
    }

    /// Position of `key` in the list.
    #[must_use]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.args.iter().position(|a| a.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolArg> {
        self.args.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Every argument in command-line form.
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        self.args.iter().map(ToolArg::render).collect()
    }
}

fn path_value(path: &std::path::Path) -> String {
    // The build tool wants forward slashes on every platform
    path.display().to_string().replace('\\', "/")
}

/// Assemble the configure arguments for one dependency.
///
/// `prerequisite_installs` are the install locations of everything this
/// dependency depends on, prerequisites first.
///
/// # Errors
///
/// [`SuperbuildError::InvalidDependency`] when one of `extra_args` is malformed.
pub fn assemble_arguments(
    name: &str,
    settings: &BuildSettings,
    layout: &InstallLayout,
    prerequisite_installs: &[PathBuf],
    extra_args: &[String],
) -> Result<ArgumentList, SuperbuildError> {
    let mut args = ArgumentList::new();

    args.set(ToolArg::new(INSTALL_PREFIX_KEY, path_value(&layout.install_dir)));

    if !settings.is_multi_config() {
        args.set(ToolArg::new(BUILD_TYPE_KEY, settings.build_type.clone()));
    }

    if let Some(cc) = &settings.c_compiler {
        args.set(ToolArg::new(C_COMPILER_KEY, cc.clone()));
    }
    if let Some(cxx) = &settings.cxx_compiler {
        args.set(ToolArg::new(CXX_COMPILER_KEY, cxx.clone()));
    }
    if let Some(flags) = &settings.c_flags {
        args.set(ToolArg::new(C_FLAGS_KEY, flags.clone()));
    }
    if let Some(flags) = &settings.cxx_flags {
        args.set(ToolArg::new(CXX_FLAGS_KEY, flags.clone()));
    }
    for (key, flags) in &settings.mode_flags {
        args.set(ToolArg::new(key.clone(), flags.clone()));
    }

    if settings.target_os == TargetOs::MacOs
        && let Some(target) = &settings.osx_deployment_target
    {
        args.set(ToolArg::new(OSX_DEPLOYMENT_TARGET_KEY, target.clone()));
    }

    if let Some(codegen) = &settings.codegen_executable {
        args.set(ToolArg::new(CODEGEN_EXECUTABLE_KEY, path_value(codegen)));
    }

    if !prerequisite_installs.is_empty() {
        let joined =
            prerequisite_installs.iter().map(|p| path_value(p)).collect::<Vec<_>>().join(";");
        args.set(ToolArg::new(PREFIX_PATH_KEY, joined));
    }

    for raw in extra_args {
        let arg = ToolArg::parse(raw).map_err(|e| SuperbuildError::InvalidDependency {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        args.set(arg);
    }

    Ok(args)
}
