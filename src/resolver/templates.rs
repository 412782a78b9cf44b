//! Template rendering for custom step commands.
//!
//! Every argument of a custom command may reference the dependency's
//! layout and the active build settings:
//!
//! | Variable | Value |
//! |---|---|
//! | `name` | dependency name |
//! | `source_dir`, `build_dir`, `install_dir`, `tmp_dir` | layout locations |
//! | `install_prefix` | shared install root |
//! | `build_type`, `build_jobs`, `generator` | build settings |
//! | `c_compiler`, `cxx_compiler` | compilers (empty when unset) |
//! | `c_flags`, `cxx_flags` | `CMAKE_C_FLAGS`, `CMAKE_CXX_FLAGS` |
//! | `c_mode_flags`, `cxx_mode_flags` | `CMAKE_<LANG>_FLAGS_<MODE>` for the active build type |
//! | `mode_flags` | every per-mode flag definition, keyed by its full name |
//! | `osx_deployment_target`, `codegen_executable` | platform target and SWIG path |
//! | `prefix_path` | `;`-joined prerequisite install locations |
//! | `cmake_args` | the assembled `-DKEY=VALUE` configure arguments |
//! | `cmake` | build tool program |
//!
//! Unset settings render as empty strings, so a step can pass the
//! operator's flags through its environment:
//!
//! ```toml
//! [dependency.env]
//! CXXFLAGS = "{{ cxx_flags }} {{ cxx_mode_flags }}"
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use tera::{Context as TeraContext, Tera};

use crate::config::BuildSettings;
use crate::core::SuperbuildError;
use crate::resolver::arguments::ArgumentList;
use crate::resolver::layout::InstallLayout;
use crate::utils::platform::get_cmake_command;

/// Variables available to custom step templates.
#[derive(Debug, Clone, Serialize)]
pub struct StepContext {
    pub name: String,
    pub source_dir: String,
    pub build_dir: String,
    pub install_dir: String,
    pub tmp_dir: String,
    pub install_prefix: String,
    pub build_type: String,
    pub build_jobs: usize,
    pub generator: String,
    pub c_compiler: String,
    pub cxx_compiler: String,
    pub c_flags: String,
    pub cxx_flags: String,
    pub c_mode_flags: String,
    pub cxx_mode_flags: String,
    pub mode_flags: BTreeMap<String, String>,
    pub osx_deployment_target: String,
    pub codegen_executable: String,
    pub prefix_path: String,
    pub cmake_args: Vec<String>,
    pub cmake: String,
}

impl StepContext {
    #[must_use]
    pub fn new(
        name: &str,
        layout: &InstallLayout,
        settings: &BuildSettings,
        arguments: &ArgumentList,
        prefix_path: &str,
    ) -> Self {
        let mode = settings.build_type.to_uppercase();
        let mode_flag = |lang: &str| {
            let key = format!("CMAKE_{lang}_FLAGS_{mode}");
            settings.mode_flags.get(&key).cloned().unwrap_or_default()
        };
        Self {
            name: name.to_string(),
            source_dir: layout.source_dir.display().to_string(),
            build_dir: layout.build_dir.display().to_string(),
            install_dir: layout.install_dir.display().to_string(),
            tmp_dir: layout.tmp_dir.display().to_string(),
            install_prefix: settings.install_root().display().to_string(),
            build_type: settings.build_type.clone(),
            build_jobs: settings.build_jobs,
            generator: settings.generator.clone().unwrap_or_default(),
            c_compiler: settings.c_compiler.clone().unwrap_or_default(),
            cxx_compiler: settings.cxx_compiler.clone().unwrap_or_default(),
            c_flags: settings.c_flags.clone().unwrap_or_default(),
            cxx_flags: settings.cxx_flags.clone().unwrap_or_default(),
            c_mode_flags: mode_flag("C"),
            cxx_mode_flags: mode_flag("CXX"),
            mode_flags: settings.mode_flags.clone(),
            osx_deployment_target: settings.osx_deployment_target.clone().unwrap_or_default(),
            codegen_executable: settings
                .codegen_executable
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
            prefix_path: prefix_path.to_string(),
            cmake_args: arguments.render(),
            cmake: get_cmake_command().to_string(),
        }
    }
}

/// Renders step arguments against one [`StepContext`].
pub struct StepRenderer {
    dependency: String,
    context: TeraContext,
}

impl StepRenderer {
    /// # Errors
    ///
    /// Fails if the context cannot be converted for tera.
    pub fn new(context: &StepContext) -> Result<Self, SuperbuildError> {
        let dependency = context.name.clone();
        let context =
            TeraContext::from_serialize(context).map_err(|e| SuperbuildError::InvalidDependency {
                name: dependency.clone(),
                reason: format_tera_error(&e),
            })?;
        Ok(Self {
            dependency,
            context,
        })
    }

    /// Render one argument. Plain strings are returned unchanged.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::InvalidDependency`] for syntax errors and
    /// unknown variables.
    pub fn render(&self, input: &str) -> Result<String, SuperbuildError> {
        if !input.contains("{{") && !input.contains("{%") {
            return Ok(input.to_string());
        }
        Tera::one_off(input, &self.context, false).map_err(|e| SuperbuildError::InvalidDependency {
            name: self.dependency.clone(),
            reason: format!("cannot render '{input}': {}", format_tera_error(&e)),
        })
    }

    /// Render every argument of a command.
    pub fn render_all(&self, inputs: &[String]) -> Result<Vec<String>, SuperbuildError> {
        inputs.iter().map(|input| self.render(input)).collect()
    }
}

fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = Vec::new();
    let mut current: Option<&dyn Error> = Some(error);
    while let Some(err) = current {
        let cleaned = err
            .to_string()
            .replace("while rendering '__tera_one_off'", "")
            .replace("Failed to render '__tera_one_off'", "")
            .replace("Failed to parse '__tera_one_off'", "syntax error")
            .replace("'__tera_one_off'", "template")
            .trim()
            .to_string();
        if !cleaned.is_empty() {
            messages.push(cleaned);
        }
        current = err.source();
    }

    if messages.is_empty() {
        "template error".to_string()
    } else {
        messages.join(": ")
    }
}
