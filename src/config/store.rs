//! Settings store persisted in the binary root.
//!
//! Toggles, feature switches and build definitions chosen on the command
//! line are remembered across invocations: `-D SUPERBUILD_eigen=OFF` once,
//! and later runs keep eigen disabled until told otherwise. The store is
//! loaded once at start-up, updated in memory, and written back atomically
//! at the end of the run.
//!
//! Only explicit choices are stored. Defaults live in the manifest, so
//! changing a default there takes effect for everyone who never overrode it.
//!
//! ```toml
//! # _superbuild-cache.toml
//! [toggles]
//! eigen = false
//!
//! [features]
//! optimal-control = true
//!
//! [definitions]
//! CMAKE_BUILD_TYPE = "Debug"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::definitions::Definition;
use super::parser::parse_config;
use crate::constants::{BUILD_JOBS_KEY, FEATURE_PREFIX, SETTINGS_FILE, TOGGLE_PREFIX};
use crate::core::SuperbuildError;
use crate::manifest::Manifest;
use crate::utils::fs::safe_write;

/// Where a stored value came from during this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredOrigin {
    /// Remembered from an earlier invocation
    Cached,
    /// Given on the command line of this invocation
    CommandLine,
}

/// Persistent user choices.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SettingsStore {
    /// Per-dependency toggles, keyed by dependency name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub toggles: BTreeMap<String, bool>,

    /// Feature switches, keyed by switch name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, bool>,

    /// Every other definition (build options)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definitions: BTreeMap<String, String>,

    #[serde(skip)]
    path: PathBuf,

    /// Keys set or unset on this invocation's command line
    #[serde(skip)]
    command_line: BTreeSet<String>,
}

impl SettingsStore {
    /// Path of the store inside `binary_root`.
    #[must_use]
    pub fn path_in(binary_root: &Path) -> PathBuf {
        binary_root.join(SETTINGS_FILE)
    }

    /// Load the store from `binary_root`, or start empty when there is none.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::SettingsParseError`] when the file exists but
    /// cannot be parsed.
    pub fn load(binary_root: &Path) -> Result<Self> {
        let path = Self::path_in(binary_root);
        let mut store = if path.exists() {
            parse_config::<Self>(&path).map_err(|e| SuperbuildError::SettingsParseError {
                file: path.display().to_string(),
                reason: format!("{e:#}"),
            })?
        } else {
            Self::default()
        };
        tracing::debug!(
            "Loaded settings store {} ({} toggles, {} features, {} definitions)",
            path.display(),
            store.toggles.len(),
            store.features.len(),
            store.definitions.len()
        );
        store.path = path;
        Ok(store)
    }

    /// An empty store that would be written to `binary_root`.
    #[must_use]
    pub fn empty(binary_root: &Path) -> Self {
        Self {
            path: Self::path_in(binary_root),
            ..Self::default()
        }
    }

    /// Where the store is written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be serialized or written.
    pub fn save(&self) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize settings store")?;
        safe_write(&self.path, &content)
            .with_context(|| format!("Failed to write settings store {}", self.path.display()))?;
        tracing::debug!("Saved settings store {}", self.path.display());
        Ok(())
    }

    /// Record command-line definitions and unsets.
    ///
    /// Keys are routed by prefix: `SUPERBUILD_FEATURE_<switch>` to feature
    /// switches, `SUPERBUILD_BUILD_JOBS` to definitions, `SUPERBUILD_<name>`
    /// to dependency toggles, everything else to definitions. Unknown
    /// toggles and switches are skipped with a warning and returned.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::InvalidDefinition`] for a toggle or switch whose
    /// value is not a boolean.
    pub fn apply(
        &mut self,
        definitions: &[Definition],
        unsets: &[String],
        manifest: &Manifest,
    ) -> Result<Vec<String>> {
        let mut ignored = Vec::new();

        for key in unsets {
            match route(key) {
                Route::Feature(name) => {
                    self.features.remove(name);
                }
                Route::Toggle(name) => {
                    self.toggles.remove(name);
                }
                Route::Definition => {
                    self.definitions.remove(key);
                }
            }
            self.command_line.insert(key.clone());
        }

        for definition in definitions {
            match route(&definition.key) {
                Route::Feature(name) => {
                    if !manifest.features.contains_key(name) {
                        tracing::warn!("Ignoring {}: no feature switch named '{}'", definition, name);
                        ignored.push(definition.key.clone());
                        continue;
                    }
                    self.features.insert(name.to_string(), definition.as_bool()?);
                }
                Route::Toggle(name) => {
                    if manifest.get(name).is_none() {
                        tracing::warn!("Ignoring {}: no dependency named '{}'", definition, name);
                        ignored.push(definition.key.clone());
                        continue;
                    }
                    self.toggles.insert(name.to_string(), definition.as_bool()?);
                }
                Route::Definition => {
                    self.definitions.insert(definition.key.clone(), definition.value.clone());
                }
            }
            self.command_line.insert(definition.key.clone());
        }

        Ok(ignored)
    }

    /// Stored toggle for `name` and where it came from.
    #[must_use]
    pub fn toggle(&self, name: &str) -> Option<(bool, StoredOrigin)> {
        self.toggles
            .get(name)
            .map(|value| (*value, self.origin_of(&format!("{TOGGLE_PREFIX}{name}"))))
    }

    /// Stored feature switch value and where it came from.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<(bool, StoredOrigin)> {
        self.features
            .get(name)
            .map(|value| (*value, self.origin_of(&format!("{FEATURE_PREFIX}{name}"))))
    }

    fn origin_of(&self, key: &str) -> StoredOrigin {
        if self.command_line.contains(key) {
            StoredOrigin::CommandLine
        } else {
            StoredOrigin::Cached
        }
    }

    /// Forget toggles and switches for names the manifest no longer declares.
    pub fn prune(&mut self, manifest: &Manifest) -> Vec<String> {
        let mut removed = Vec::new();
        self.toggles.retain(|name, _| {
            let keep = manifest.get(name).is_some();
            if !keep {
                removed.push(format!("{TOGGLE_PREFIX}{name}"));
            }
            keep
        });
        self.features.retain(|name, _| {
            let keep = manifest.features.contains_key(name);
            if !keep {
                removed.push(format!("{FEATURE_PREFIX}{name}"));
            }
            keep
        });
        removed
    }
}

enum Route<'a> {
    Feature(&'a str),
    Toggle(&'a str),
    Definition,
}

fn route(key: &str) -> Route<'_> {
    if let Some(name) = key.strip_prefix(FEATURE_PREFIX) {
        Route::Feature(name)
    } else if key == BUILD_JOBS_KEY {
        Route::Definition
    } else if let Some(name) = key.strip_prefix(TOGGLE_PREFIX) {
        Route::Toggle(name)
    } else {
        Route::Definition
    }
}
