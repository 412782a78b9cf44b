//! Toggle evaluation.
//!
//! Everything here is a pure function of the manifest and the settings
//! store: feature switch values first, then each dependency's availability,
//! effective default and final toggle value. Availability is transitive:
//! an enabled dependency pulls its prerequisites in past their own feature
//! groups. No filesystem or network
//! access happens while deciding what is enabled.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{SettingsStore, StoredOrigin};
use crate::manifest::{DependencySpec, Manifest};

/// Where a toggle or switch value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToggleOrigin {
    /// Declared default in the manifest
    Default,
    /// Remembered from an earlier invocation
    Cached,
    /// Given on this invocation's command line
    CommandLine,
    /// Forced off because a required feature switch is off
    Forced,
}

impl From<StoredOrigin> for ToggleOrigin {
    fn from(origin: StoredOrigin) -> Self {
        match origin {
            StoredOrigin::Cached => Self::Cached,
            StoredOrigin::CommandLine => Self::CommandLine,
        }
    }
}

impl fmt::Display for ToggleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Default => "default",
            Self::Cached => "cached",
            Self::CommandLine => "command line",
            Self::Forced => "forced",
        };
        f.write_str(label)
    }
}

/// Why a dependency is not considered at all this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exclusion {
    /// Its feature group is switched off
    FeatureOff {
        feature: String,
    },
    /// It does not support the current platform
    Platform {
        platforms: Vec<String>,
    },
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureOff {
                feature,
            } => write!(f, "feature '{feature}' is off"),
            Self::Platform {
                platforms,
            } => write!(f, "only available on {}", platforms.join(", ")),
        }
    }
}

/// Evaluated value of one feature switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureState {
    pub name: String,
    pub enabled: bool,
    pub origin: ToggleOrigin,
}

/// Effective default of a toggle before user overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveDefault {
    pub value: bool,
    /// A required switch is off; no user value can turn the toggle on
    pub forced_off: bool,
}

/// Evaluated toggle of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleState {
    pub name: String,
    /// `Some` when the dependency is excluded from this run
    pub excluded: Option<Exclusion>,
    pub enabled: bool,
    pub origin: ToggleOrigin,
    /// Enabled dependent that pulled this one in past its own feature group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_by: Option<String>,
}

impl ToggleState {
    /// Included and switched on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.excluded.is_none() && self.enabled
    }

    /// Human-readable reason a prerequisite will not be built.
    #[must_use]
    pub fn off_reason(&self) -> String {
        match &self.excluded {
            Some(exclusion) => format!("excluded ({exclusion})"),
            None if self.origin == ToggleOrigin::Forced => "forced off".to_string(),
            None => "disabled".to_string(),
        }
    }
}

/// All feature switches and toggles for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToggleTable {
    pub features: Vec<FeatureState>,
    /// One entry per dependency, in declaration order
    pub toggles: Vec<ToggleState>,
}

impl ToggleTable {
    /// Look up a dependency's toggle.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToggleState> {
        self.toggles.iter().find(|t| t.name == name)
    }

    /// Value of a feature switch (`false` when undeclared).
    #[must_use]
    pub fn feature(&self, name: &str) -> bool {
        self.features.iter().any(|f| f.name == name && f.enabled)
    }
}

/// Evaluate every feature switch: stored value if any, else declared default.
#[must_use]
pub fn evaluate_features(manifest: &Manifest, store: &SettingsStore) -> Vec<FeatureState> {
    manifest
        .features
        .iter()
        .map(|(name, switch)| {
            let (enabled, origin) = store
                .feature(name)
                .map_or((switch.default, ToggleOrigin::Default), |(value, origin)| {
                    (value, origin.into())
                });
            FeatureState {
                name: name.clone(),
                enabled,
                origin,
            }
        })
        .collect()
}

/// Effective default of `spec` given the full switch set.
#[must_use]
pub fn effective_default(spec: &DependencySpec, features: &BTreeMap<String, bool>) -> EffectiveDefault {
    let forced_off = spec
        .enabled
        .requires
        .iter()
        .any(|switch| !features.get(switch).copied().unwrap_or(false));
    EffectiveDefault {
        value: spec.enabled.default && !forced_off,
        forced_off,
    }
}

/// Availability of `spec`: excluded when its feature group is off or the
/// host platform is not supported.
#[must_use]
pub fn exclusion(spec: &DependencySpec, features: &BTreeMap<String, bool>) -> Option<Exclusion> {
    if let Some(feature) = &spec.feature
        && !features.get(feature).copied().unwrap_or(false)
    {
        return Some(Exclusion::FeatureOff {
            feature: feature.clone(),
        });
    }
    if !spec.available_on_host() {
        return Some(Exclusion::Platform {
            platforms: spec.platforms.clone(),
        });
    }
    None
}

/// Evaluate features and toggles for the whole manifest.
#[must_use]
pub fn evaluate(manifest: &Manifest, store: &SettingsStore) -> ToggleTable {
    let features = evaluate_features(manifest, store);
    let switch_values: BTreeMap<String, bool> =
        features.iter().map(|f| (f.name.clone(), f.enabled)).collect();

    let toggles = manifest
        .dependencies
        .iter()
        .map(|spec| {
            let excluded = exclusion(spec, &switch_values);
            let default = effective_default(spec, &switch_values);
            let (enabled, origin) = if default.forced_off {
                (false, ToggleOrigin::Forced)
            } else {
                store
                    .toggle(&spec.name)
                    .map_or((default.value, ToggleOrigin::Default), |(value, origin)| {
                        (value, origin.into())
                    })
            };
            ToggleState {
                name: spec.name.clone(),
                excluded,
                enabled,
                origin,
                required_by: None,
            }
        })
        .collect();
    let toggles = include_required_prerequisites(manifest, toggles);

    ToggleTable {
        features,
        toggles,
    }
}

/// Lift feature exclusions from prerequisites of enabled dependencies.
///
/// A feature switch gates its group and, transitively, whatever that group
/// depends on. Repeats until no exclusion changes, so prerequisites of a
/// pulled-in prerequisite are pulled in too.
fn include_required_prerequisites(
    manifest: &Manifest,
    mut toggles: Vec<ToggleState>,
) -> Vec<ToggleState> {
    loop {
        let mut lifted = Vec::new();
        for (spec, toggle) in manifest.dependencies.iter().zip(&toggles) {
            if !toggle.is_enabled() {
                continue;
            }
            for prerequisite in &spec.prerequisites {
                if let Some(index) = toggles.iter().position(|t| &t.name == prerequisite)
                    && matches!(toggles[index].excluded, Some(Exclusion::FeatureOff { .. }))
                    && !lifted.iter().any(|(i, _)| *i == index)
                {
                    lifted.push((index, spec.name.clone()));
                }
            }
        }
        if lifted.is_empty() {
            return toggles;
        }
        for (index, dependent) in lifted {
            tracing::debug!("{} included: required by {}", toggles[index].name, dependent);
            toggles[index].excluded = None;
            toggles[index].required_by = Some(dependent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Definition;
    use std::path::PathBuf;

    fn manifest() -> Manifest {
        Manifest::from_toml_str(
            r#"
            [features.optimal-control]
            default = false
            [features.python]
            default = true

            [[dependency]]
            name = "eigen"
            url = "eigen.tgz"

            [[dependency]]
            name = "ipopt"
            url = "ipopt.tgz"
            feature = "optimal-control"

            [[dependency]]
            name = "swig"
            url = "swig.tgz"
            enabled = { default = true, requires = ["python"] }

            [[dependency]]
            name = "docs"
            url = "docs.tgz"
            enabled = false
            "#,
            "superbuild.toml",
            PathBuf::from("/p"),
        )
        .unwrap()
    }

    fn store_with(defs: &[&str]) -> SettingsStore {
        let mut store = SettingsStore::default();
        let defs: Vec<Definition> = defs.iter().map(|d| d.parse().unwrap()).collect();
        store.apply(&defs, &[], &manifest()).unwrap();
        store
    }

    #[test]
    fn test_defaults() {
        let table = evaluate(&manifest(), &SettingsStore::default());

        assert!(table.get("eigen").unwrap().is_enabled());
        let ipopt = table.get("ipopt").unwrap();
        assert_eq!(
            ipopt.excluded,
            Some(Exclusion::FeatureOff {
                feature: "optimal-control".to_string()
            })
        );
        assert!(!ipopt.is_enabled());
        assert!(table.get("swig").unwrap().is_enabled());
        let docs = table.get("docs").unwrap();
        assert!(!docs.enabled);
        assert_eq!(docs.origin, ToggleOrigin::Default);
    }

    #[test]
    fn test_feature_switch_includes_group() {
        let table = evaluate(&manifest(), &store_with(&["SUPERBUILD_FEATURE_optimal-control=ON"]));
        assert!(table.get("ipopt").unwrap().is_enabled());
        assert!(table.feature("optimal-control"));
        assert_eq!(table.features[0].origin, ToggleOrigin::CommandLine);
    }

    #[test]
    fn test_requires_forces_off_even_over_user_value() {
        let table = evaluate(
            &manifest(),
            &store_with(&["SUPERBUILD_FEATURE_python=OFF", "SUPERBUILD_swig=ON"]),
        );
        let swig = table.get("swig").unwrap();
        assert!(!swig.enabled);
        assert_eq!(swig.origin, ToggleOrigin::Forced);
        assert_eq!(swig.off_reason(), "forced off");
    }

    #[test]
    fn test_user_toggle_overrides_default() {
        let table = evaluate(&manifest(), &store_with(&["SUPERBUILD_docs=ON", "SUPERBUILD_eigen=OFF"]));
        assert!(table.get("docs").unwrap().is_enabled());
        let eigen = table.get("eigen").unwrap();
        assert!(!eigen.is_enabled());
        assert_eq!(eigen.origin, ToggleOrigin::CommandLine);
        assert_eq!(eigen.off_reason(), "disabled");
    }

    #[test]
    fn test_effective_default_is_pure() {
        let manifest = manifest();
        let swig = manifest.get("swig").unwrap();
        let mut switches = BTreeMap::new();
        switches.insert("python".to_string(), true);
        assert_eq!(
            effective_default(swig, &switches),
            EffectiveDefault {
                value: true,
                forced_off: false
            }
        );
        switches.insert("python".to_string(), false);
        assert!(effective_default(swig, &switches).forced_off);
    }

    #[test]
    fn test_other_platform_is_excluded() {
        let other = if cfg!(windows) { "unix" } else { "windows" };
        let manifest = Manifest::from_toml_str(
            &format!(
                "[[dependency]]\nname = \"winonly\"\nurl = \"w.zip\"\nplatforms = [\"{other}\"]\n"
            ),
            "superbuild.toml",
            PathBuf::from("/p"),
        )
        .unwrap();
        let table = evaluate(&manifest, &SettingsStore::default());
        let state = table.get("winonly").unwrap();
        assert!(matches!(&state.excluded, Some(Exclusion::Platform { platforms }) if platforms == &[other]));
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_enabled_dependent_pulls_in_gated_prerequisites() {
        let manifest = Manifest::from_toml_str(
            r#"
            [features.tropter]
            default = false
            [features.casadi]
            default = false

            [[dependency]]
            name = "mumps"
            url = "mumps.tgz"
            feature = "tropter"

            [[dependency]]
            name = "ipopt"
            url = "ipopt.tgz"
            feature = "tropter"
            depends = ["mumps"]

            [[dependency]]
            name = "casadi"
            url = "casadi.tgz"
            feature = "casadi"
            depends = ["ipopt"]
            "#,
            "superbuild.toml",
            PathBuf::from("/p"),
        )
        .unwrap();

        let off = evaluate(&manifest, &SettingsStore::default());
        assert!(off.toggles.iter().all(|t| t.excluded.is_some()));

        let mut store = SettingsStore::default();
        let defs: Vec<Definition> = vec!["SUPERBUILD_FEATURE_casadi=ON".parse().unwrap()];
        store.apply(&defs, &[], &manifest).unwrap();
        let table = evaluate(&manifest, &store);

        let ipopt = table.get("ipopt").unwrap();
        assert!(ipopt.is_enabled());
        assert_eq!(ipopt.required_by.as_deref(), Some("casadi"));
        let mumps = table.get("mumps").unwrap();
        assert!(mumps.is_enabled());
        assert_eq!(mumps.required_by.as_deref(), Some("ipopt"));
        assert!(!table.feature("tropter"));
    }
}
