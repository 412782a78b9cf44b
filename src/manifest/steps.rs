//! Custom phase sub-steps for dependencies that do not follow the default
//! configure/build/install recipe.
//!
//! ```toml
//! [[dependency]]
//! name = "ipopt"
//! url = "https://example.org/Ipopt-3.14.tgz"
//!
//! [dependency.env]
//! CFLAGS = "-O2 -fPIC"
//!
//! [dependency.steps]
//! patch = [["sh", "-c", "sed -i 's/-Werror//' configure"]]
//! configure = [["{{ source_dir }}/configure", "--prefix={{ install_dir }}"]]
//! build = [["make", "-j{{ build_jobs }}"]]
//! install = [["make", "install"]]
//! ```
//!
//! Every element is a tera template rendered with the dependency's layout
//! and the active build settings before the command runs.

use serde::{Deserialize, Serialize};

/// One command: program followed by its arguments.
pub type StepCommand = Vec<String>;

/// Per-phase overrides and additions.
///
/// `None` for configure/build/install keeps the default build-tool action;
/// `Some(vec![])` turns that phase into a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CustomSteps {
    /// Run in the source tree after fetching
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patch: Vec<StepCommand>,

    /// Run in the source tree before configuring (code regeneration)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepare: Vec<StepCommand>,

    /// Replaces the default configure action, run in the build tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure: Option<Vec<StepCommand>>,

    /// Replaces the default build action, run in the build tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Vec<StepCommand>>,

    /// Replaces the default install action, run in the build tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<Vec<StepCommand>>,
}

impl CustomSteps {
    /// Whether any phase deviates from the default recipe.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        !self.patch.is_empty()
            || !self.prepare.is_empty()
            || self.configure.is_some()
            || self.build.is_some()
            || self.install.is_some()
    }

    /// Every command with the section it belongs to, for validation.
    pub fn all_commands(&self) -> impl Iterator<Item = (&'static str, &StepCommand)> {
        self.patch
            .iter()
            .map(|cmd| ("patch", cmd))
            .chain(self.prepare.iter().map(|cmd| ("prepare", cmd)))
            .chain(self.configure.iter().flatten().map(|cmd| ("configure", cmd)))
            .chain(self.build.iter().flatten().map(|cmd| ("build", cmd)))
            .chain(self.install.iter().flatten().map(|cmd| ("install", cmd)))
    }
}
