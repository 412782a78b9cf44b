//! Ambient build settings shared by every dependency.
//!
//! [`BuildSettings`] is derived once per run from the persisted and
//! command-line definitions. It decides the shared install root, the build
//! mode, the compilers and flags propagated to each dependency, and the
//! parallel level handed to the build tool.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{BUILD_JOBS_KEY, DEFAULT_BUILD_JOBS, DEFAULT_BUILD_TYPE, DEFAULT_INSTALL_DIR};
use crate::core::SuperbuildError;
use crate::utils::platform::{absolutize, resolve_path};

pub const INSTALL_PREFIX_KEY: &str = "CMAKE_INSTALL_PREFIX";
pub const BUILD_TYPE_KEY: &str = "CMAKE_BUILD_TYPE";
pub const GENERATOR_KEY: &str = "CMAKE_GENERATOR";
pub const C_COMPILER_KEY: &str = "CMAKE_C_COMPILER";
pub const CXX_COMPILER_KEY: &str = "CMAKE_CXX_COMPILER";
pub const C_FLAGS_KEY: &str = "CMAKE_C_FLAGS";
pub const CXX_FLAGS_KEY: &str = "CMAKE_CXX_FLAGS";
pub const OSX_DEPLOYMENT_TARGET_KEY: &str = "CMAKE_OSX_DEPLOYMENT_TARGET";
pub const CODEGEN_EXECUTABLE_KEY: &str = "SWIG_EXECUTABLE";

/// Operating system the build targets. Defaults to the host; tests pin it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl TargetOs {
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }
}

/// Settings propagated to every enabled dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    /// Install root chosen by the operator, if any
    pub install_prefix: Option<PathBuf>,
    /// `<project>/install`, used when no install root was chosen
    pub default_install_prefix: PathBuf,
    pub build_type: String,
    pub generator: Option<String>,
    pub c_compiler: Option<String>,
    pub cxx_compiler: Option<String>,
    pub c_flags: Option<String>,
    pub cxx_flags: Option<String>,
    /// `CMAKE_<LANG>_FLAGS_<MODE>` definitions, keyed by their full name
    pub mode_flags: BTreeMap<String, String>,
    pub osx_deployment_target: Option<String>,
    /// Code-generation helper (SWIG) handed to dependencies that need it
    pub codegen_executable: Option<PathBuf>,
    pub build_jobs: usize,
    pub target_os: TargetOs,
}

/// Default install location, next to the manifest.
#[must_use]
pub fn default_install_prefix(project_dir: &Path) -> PathBuf {
    project_dir.join(DEFAULT_INSTALL_DIR)
}

/// Build mode from definitions, `Release` unless the operator picked one.
#[must_use]
pub fn select_build_type(definitions: &BTreeMap<String, String>) -> String {
    definitions
        .get(BUILD_TYPE_KEY)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_BUILD_TYPE)
        .to_string()
}

/// Whether `key` is a definition [`BuildSettings`] understands.
#[must_use]
pub fn is_build_setting(key: &str) -> bool {
    matches!(
        key,
        INSTALL_PREFIX_KEY
            | BUILD_TYPE_KEY
            | GENERATOR_KEY
            | C_COMPILER_KEY
            | CXX_COMPILER_KEY
            | C_FLAGS_KEY
            | CXX_FLAGS_KEY
            | OSX_DEPLOYMENT_TARGET_KEY
            | CODEGEN_EXECUTABLE_KEY
            | BUILD_JOBS_KEY
    ) || is_mode_flags_key(key)
}

fn is_mode_flags_key(key: &str) -> bool {
    ["CMAKE_C_FLAGS_", "CMAKE_CXX_FLAGS_"]
        .iter()
        .any(|prefix| key.strip_prefix(prefix).is_some_and(|mode| !mode.is_empty()))
}

fn non_empty(definitions: &BTreeMap<String, String>, key: &str) -> Option<String> {
    definitions.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl BuildSettings {
    /// Settings with every option at its default.
    #[must_use]
    pub fn defaults(project_dir: &Path) -> Self {
        Self {
            install_prefix: None,
            default_install_prefix: default_install_prefix(project_dir),
            build_type: DEFAULT_BUILD_TYPE.to_string(),
            generator: None,
            c_compiler: None,
            cxx_compiler: None,
            c_flags: None,
            cxx_flags: None,
            mode_flags: BTreeMap::new(),
            osx_deployment_target: None,
            codegen_executable: None,
            build_jobs: DEFAULT_BUILD_JOBS,
            target_os: TargetOs::host(),
        }
    }

    /// Derive settings from the merged definitions.
    ///
    /// Paths are expanded (`~`, `$VAR`) and relative install prefixes are
    /// resolved against `project_dir`.
    ///
    /// # Errors
    ///
    /// Path expansion failures and a non-numeric `SUPERBUILD_BUILD_JOBS`.
    pub fn from_definitions(
        definitions: &BTreeMap<String, String>,
        project_dir: &Path,
    ) -> Result<Self> {
        let mut settings = Self::defaults(project_dir);

        if let Some(prefix) = non_empty(definitions, INSTALL_PREFIX_KEY) {
            settings.install_prefix = Some(absolutize(project_dir, &resolve_path(&prefix)?));
        }
        settings.build_type = select_build_type(definitions);
        settings.generator = non_empty(definitions, GENERATOR_KEY);
        settings.c_compiler = non_empty(definitions, C_COMPILER_KEY);
        settings.cxx_compiler = non_empty(definitions, CXX_COMPILER_KEY);
        settings.c_flags = definitions.get(C_FLAGS_KEY).cloned();
        settings.cxx_flags = definitions.get(CXX_FLAGS_KEY).cloned();
        settings.mode_flags = definitions
            .iter()
            .filter(|(key, _)| is_mode_flags_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        settings.osx_deployment_target = non_empty(definitions, OSX_DEPLOYMENT_TARGET_KEY);
        if let Some(codegen) = non_empty(definitions, CODEGEN_EXECUTABLE_KEY) {
            settings.codegen_executable = Some(resolve_path(&codegen)?);
        }
        if let Some(jobs) = non_empty(definitions, BUILD_JOBS_KEY) {
            settings.build_jobs = jobs.parse::<usize>().ok().filter(|j| *j > 0).ok_or_else(|| {
                SuperbuildError::InvalidDefinition {
                    definition: format!("{BUILD_JOBS_KEY}={jobs}"),
                    reason: "expected a positive integer".to_string(),
                }
            })?;
        }

        Ok(settings)
    }

    /// The install root every dependency installs under this run.
    #[must_use]
    pub fn install_root(&self) -> &Path {
        self.install_prefix.as_deref().unwrap_or(&self.default_install_prefix)
    }

    /// Whether the operator moved the install root away from the default.
    #[must_use]
    pub fn uses_custom_install_root(&self) -> bool {
        self.install_prefix.as_deref().is_some_and(|p| p != self.default_install_prefix)
    }

    /// Multi-configuration generators pick the mode at build time (`--config`).
    #[must_use]
    pub fn is_multi_config(&self) -> bool {
        self.generator.as_deref().is_some_and(|g| {
            g.starts_with("Visual Studio") || g == "Xcode" || g == "Ninja Multi-Config"
        })
    }

    /// Parallel level passed to the build tool, if any.
    ///
    /// Only Linux makefile-style generators get an explicit level; Ninja
    /// schedules its own jobs.
    #[must_use]
    pub fn parallel_level(&self) -> Option<usize> {
        let ninja = self.generator.as_deref().is_some_and(|g| g.starts_with("Ninja"));
        (self.target_os == TargetOs::Linux && !ninja).then_some(self.build_jobs)
    }
}
