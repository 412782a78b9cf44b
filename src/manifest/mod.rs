//! The dependency declaration file, `superbuild.toml`
//!
//! A manifest lists the third-party libraries a host project needs, in the
//! order they are declared, plus the feature switches that gate groups of
//! them.
//!
//! ```toml
//! [project]
//! name = "robotics-stack"
//!
//! [features.optimal-control]
//! default = false
//! description = "Nonlinear solvers"
//!
//! [[dependency]]
//! name = "eigen"
//! url = "https://gitlab.com/libeigen/eigen/-/archive/3.4.0/eigen-3.4.0.tar.gz"
//!
//! [[dependency]]
//! name = "ipopt"
//! git = "https://github.com/coin-or/Ipopt.git"
//! tag = "releases/3.14.16"
//! feature = "optimal-control"
//!
//! [[dependency]]
//! name = "casadi"
//! git = "https://github.com/casadi/casadi.git"
//! tag = "3.6.5"
//! depends = ["ipopt", "eigen"]
//! feature = "optimal-control"
//! args = ["WITH_IPOPT=ON", "WITH_PYTHON:BOOL=OFF"]
//! ```
//!
//! Loading a manifest validates everything that can be checked without
//! touching the network: entry shape, name uniqueness, feature references,
//! prerequisite existence and acyclicity. A manifest that loads is safe to
//! plan.

pub mod dependency_spec;
pub mod feature;
pub mod steps;

pub use dependency_spec::{
    DependencySpec, EnableCondition, RawDependency, RawEnabled, SourceLocator, validate_name,
};
pub use feature::FeatureSwitch;
pub use steps::{CustomSteps, StepCommand};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use strsim::levenshtein;

use crate::constants::MANIFEST_FILE;
use crate::core::SuperbuildError;
use crate::resolver::dependency_graph::DependencyGraph;

/// Maximum edit distance, as a percentage of the name length, for a
/// "did you mean" suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Optional `[project]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    project: ProjectSection,
    #[serde(default)]
    features: BTreeMap<String, FeatureSwitch>,
    #[serde(default, rename = "dependency")]
    dependencies: Vec<RawDependency>,
}

/// A loaded and validated manifest.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Manifest {
    pub project: ProjectSection,
    pub features: BTreeMap<String, FeatureSwitch>,
    /// Dependencies in declaration order
    pub dependencies: Vec<DependencySpec>,
    /// Directory holding the manifest; relative paths resolve against it
    #[serde(skip)]
    pub project_dir: PathBuf,
}

impl Manifest {
    /// Read and validate the manifest at `path`.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::ManifestParseError`] for TOML or schema errors, or
    /// any validation error from [`Manifest::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file: {}", path.display()))?;
        let project_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self::from_toml_str(&content, &path.display().to_string(), project_dir)
    }

    /// Parse and validate manifest text; `file` is only used in messages.
    pub fn from_toml_str(content: &str, file: &str, project_dir: PathBuf) -> Result<Self> {
        let raw: RawManifest =
            toml::from_str(content).map_err(|e| SuperbuildError::ManifestParseError {
                file: file.to_string(),
                reason: e.to_string(),
            })?;

        let dependencies = raw
            .dependencies
            .into_iter()
            .enumerate()
            .map(|(index, dep)| dep.into_spec(index))
            .collect::<Result<Vec<_>, _>>()?;

        let manifest = Self {
            project: raw.project,
            features: raw.features,
            dependencies,
            project_dir,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check cross-entry invariants.
    ///
    /// # Errors
    ///
    /// Duplicate names, references to undeclared features or prerequisites,
    /// and prerequisite cycles.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if !seen.insert(dep.name.as_str()) {
                return Err(SuperbuildError::DuplicateDependency {
                    name: dep.name.clone(),
                }
                .into());
            }
        }

        for dep in &self.dependencies {
            for feature in dep.feature.iter().chain(dep.enabled.requires.iter()) {
                if !self.features.contains_key(feature) {
                    return Err(SuperbuildError::UnknownFeature {
                        name: dep.name.clone(),
                        feature: feature.clone(),
                    }
                    .into());
                }
            }

            for prerequisite in &dep.prerequisites {
                if !seen.contains(prerequisite.as_str()) {
                    return Err(SuperbuildError::UnknownPrerequisite {
                        name: dep.name.clone(),
                        prerequisite: prerequisite.clone(),
                        suggestion: self.closest_name(prerequisite),
                    }
                    .into());
                }
            }
        }

        DependencyGraph::from_specs(&self.dependencies).detect_cycles()?;
        Ok(())
    }

    /// Look up a dependency by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DependencySpec> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// The declared name closest to `target`, if any is close enough.
    #[must_use]
    pub fn closest_name(&self, target: &str) -> Option<String> {
        self.dependencies
            .iter()
            .map(|d| (d.name.as_str(), levenshtein(target, &d.name)))
            .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .min_by_key(|(_, dist)| *dist)
            .map(|(name, _)| name.to_string())
    }
}

/// Find `superbuild.toml` in the current directory or any parent.
///
/// # Errors
///
/// [`SuperbuildError::ManifestNotFound`] when no directory up to the root
/// holds one.
pub fn find_manifest() -> Result<PathBuf> {
    let current = std::env::current_dir()
        .context("Cannot determine current working directory")?;
    find_manifest_from(current)
}

/// Use `explicit_path` if given, otherwise search from the current directory.
pub fn find_manifest_with_optional(explicit_path: Option<PathBuf>) -> Result<PathBuf> {
    match explicit_path {
        Some(path) if path.is_dir() => find_manifest_in(&path),
        Some(path) => {
            if path.exists() {
                Ok(path)
            } else {
                Err(SuperbuildError::ManifestNotFound.into())
            }
        }
        None => find_manifest(),
    }
}

fn find_manifest_in(dir: &Path) -> Result<PathBuf> {
    let candidate = dir.join(MANIFEST_FILE);
    if candidate.exists() {
        Ok(candidate)
    } else {
        Err(SuperbuildError::ManifestNotFound.into())
    }
}

/// Search `current` and its ancestors for `superbuild.toml`.
pub fn find_manifest_from(mut current: PathBuf) -> Result<PathBuf> {
    loop {
        let manifest_path = current.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Ok(manifest_path);
        }

        if !current.pop() {
            return Err(SuperbuildError::ManifestNotFound.into());
        }
    }
}
