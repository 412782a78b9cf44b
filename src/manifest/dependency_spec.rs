//! One `[[dependency]]` entry: raw TOML form and validated form.
//!
//! [`RawDependency`] mirrors the file exactly so that a missing name or a
//! contradictory source locator can be reported precisely;
//! [`RawDependency::into_spec`] turns it into a [`DependencySpec`] whose
//! fields are guaranteed consistent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::steps::CustomSteps;
use crate::constants::{RESERVED_NAMES, TOGGLE_PREFIX};
use crate::core::SuperbuildError;
use crate::utils::platform::PLATFORM_FAMILIES;

static NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.+-]*$").ok());

/// Where a dependency's sources come from. Exactly one form per dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLocator {
    /// Archive downloaded (or copied, for `file://` and plain paths) and extracted
    Archive {
        /// Archive location
        url: String,
    },
    /// Repository cloned and checked out at one tag or commit
    Repository {
        /// Anything `git clone` accepts
        address: String,
        /// Tag or commit hash
        revision: String,
    },
}

impl SourceLocator {
    /// Short description for listings.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Archive {
                url,
            } => url.clone(),
            Self::Repository {
                address,
                revision,
            } => format!("{address}@{revision}"),
        }
    }
}

/// The `enabled` key: a plain boolean or a default conditional on switches.
///
/// ```toml
/// enabled = false
/// enabled = { default = true, requires = ["python-bindings"] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawEnabled {
    /// Unconditional default
    Flag(bool),
    /// Default forced off while any listed switch is off
    Conditional {
        /// Default when every required switch is on
        default: bool,
        /// Feature switches that must all be on
        #[serde(default)]
        requires: Vec<String>,
    },
}

/// Normalized enable condition of a dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnableCondition {
    /// Default toggle value
    pub default: bool,
    /// Feature switches that must all be on for the dependency to be enabled at all
    pub requires: Vec<String>,
}

impl Default for EnableCondition {
    fn default() -> Self {
        Self {
            default: true,
            requires: Vec::new(),
        }
    }
}

impl From<RawEnabled> for EnableCondition {
    fn from(raw: RawEnabled) -> Self {
        match raw {
            RawEnabled::Flag(default) => Self {
                default,
                requires: Vec::new(),
            },
            RawEnabled::Conditional {
                default,
                requires,
            } => Self {
                default,
                requires,
            },
        }
    }
}

/// A `[[dependency]]` table as written in `superbuild.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RawDependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Archive locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Repository address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    /// Revision pin as a tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Revision pin as a commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<RawEnabled>,

    /// Prerequisites
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,

    /// Extra `KEY=VALUE` / `KEY:TYPE=VALUE` configure arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Feature switch gating this dependency; an enabled dependent from
    /// another group still pulls it in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,

    /// Platform families the dependency is available on (all when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,

    /// Pre-built archive per platform family
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prebuilt: BTreeMap<String, String>,

    /// Extra environment for this dependency's commands
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub steps: CustomSteps,
}

/// A validated dependency declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencySpec {
    /// Unique name, used for toggles and install paths
    pub name: String,
    pub locator: SourceLocator,
    pub enabled: EnableCondition,
    /// Names of dependencies installed before this one starts fetching
    pub prerequisites: Vec<String>,
    /// Opaque configure arguments appended after the propagated settings
    pub extra_args: Vec<String>,
    pub feature: Option<String>,
    pub platforms: Vec<String>,
    pub prebuilt: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub steps: CustomSteps,
}

impl DependencySpec {
    /// A dependency with default settings, mostly for tests and builders.
    #[must_use]
    pub fn new(name: impl Into<String>, locator: SourceLocator) -> Self {
        Self {
            name: name.into(),
            locator,
            enabled: EnableCondition::default(),
            prerequisites: Vec::new(),
            extra_args: Vec::new(),
            feature: None,
            platforms: Vec::new(),
            prebuilt: BTreeMap::new(),
            env: BTreeMap::new(),
            steps: CustomSteps::default(),
        }
    }

    /// Persistent toggle key, `SUPERBUILD_<name>`.
    #[must_use]
    pub fn toggle_key(&self) -> String {
        format!("{TOGGLE_PREFIX}{}", self.name)
    }

    /// Whether the dependency may be built on the current platform.
    #[must_use]
    pub fn available_on_host(&self) -> bool {
        self.platforms.is_empty()
            || self.platforms.iter().any(|p| crate::utils::platform::matches_family(p))
    }

    /// Pre-built archive for the current platform, if one is declared.
    #[must_use]
    pub fn prebuilt_for_host(&self) -> Option<&str> {
        self.prebuilt
            .iter()
            .find(|(family, _)| crate::utils::platform::matches_family(family))
            .map(|(_, url)| url.as_str())
    }
}

/// Validate a dependency name.
///
/// # Errors
///
/// [`SuperbuildError::InvalidDependency`] for names that are empty, contain
/// characters unusable in paths and definitions, or shadow reserved keys.
pub fn validate_name(name: &str) -> Result<(), SuperbuildError> {
    let invalid = |reason: &str| SuperbuildError::InvalidDependency {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let well_formed = NAME_PATTERN.as_ref().is_some_and(|re| re.is_match(name));
    if !well_formed {
        return Err(invalid(
            "names must start with a letter or digit and contain only letters, digits, '_', '.', '+' or '-'",
        ));
    }
    if RESERVED_NAMES.contains(&name) || name.starts_with("FEATURE_") {
        return Err(invalid("this name is reserved for superbuild's own definitions"));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawDependency {
    /// Validate and normalize this entry. `index` is its zero-based position,
    /// used to identify entries without a name.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::InvalidDependency`] when the entry is malformed.
    pub fn into_spec(self, index: usize) -> Result<DependencySpec, SuperbuildError> {
        let Some(name) = non_empty(self.name) else {
            return Err(SuperbuildError::InvalidDependency {
                name: format!("entry #{}", index + 1),
                reason: "missing `name`".to_string(),
            });
        };
        validate_name(&name)?;

        let invalid = |reason: String| SuperbuildError::InvalidDependency {
            name: name.clone(),
            reason,
        };

        let pins = (non_empty(self.url), non_empty(self.git), non_empty(self.tag), non_empty(self.rev));
        let locator = match pins {
            (Some(_), Some(_), _, _) => {
                return Err(invalid(
                    "both an archive `url` and a `git` repository are given; use exactly one"
                        .to_string(),
                ));
            }
            (Some(_), None, Some(_), _) | (Some(_), None, _, Some(_)) => {
                return Err(invalid("`tag`/`rev` only apply to `git` sources".to_string()));
            }
            (Some(url), None, None, None) => SourceLocator::Archive {
                url,
            },
            (None, Some(_), Some(_), Some(_)) => {
                return Err(invalid("give either `tag` or `rev`, not both".to_string()));
            }
            (None, Some(address), Some(revision), None)
            | (None, Some(address), None, Some(revision)) => SourceLocator::Repository {
                address,
                revision,
            },
            (None, Some(_), None, None) => {
                return Err(invalid("a `git` source needs a `tag` or `rev` pin".to_string()));
            }
            (None, None, Some(_), _) | (None, None, _, Some(_)) => {
                return Err(invalid("a revision pin needs a `git` repository address".to_string()));
            }
            (None, None, None, None) => {
                return Err(invalid(
                    "no source given; set `url` or `git` with `tag`/`rev`".to_string(),
                ));
            }
        };

        for arg in &self.args {
            let key = arg.split_once('=').map(|(key, _)| key.split(':').next().unwrap_or(key));
            if !key.is_some_and(|k| !k.trim().is_empty()) {
                return Err(invalid(format!("argument '{arg}' is not of the form KEY=VALUE")));
            }
        }

        for family in self.platforms.iter().chain(self.prebuilt.keys()) {
            if !PLATFORM_FAMILIES.contains(&family.as_str()) {
                return Err(invalid(format!(
                    "unknown platform '{family}', expected one of {}",
                    PLATFORM_FAMILIES.join(", ")
                )));
            }
        }

        for (section, command) in self.steps.all_commands() {
            if command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(invalid(format!("empty command in steps.{section}")));
            }
        }

        if self.depends.iter().any(|d| d == &name) {
            return Err(SuperbuildError::CircularDependency {
                chain: format!("{name} → {name}"),
            });
        }

        Ok(DependencySpec {
            name,
            locator,
            enabled: self.enabled.map(EnableCondition::from).unwrap_or_default(),
            prerequisites: self.depends,
            extra_args: self.args,
            feature: non_empty(self.feature),
            platforms: self.platforms,
            prebuilt: self.prebuilt,
            env: self.env,
            steps: self.steps,
        })
    }
}
