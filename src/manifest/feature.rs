//! Feature switches declared under `[features]`.

use serde::{Deserialize, Serialize};

/// A named boolean gating a group of dependencies.
///
/// ```toml
/// [features.optimal-control]
/// default = false
/// description = "Solvers needed by the optimal control examples"
/// ```
///
/// Dependencies join the group with `feature = "optimal-control"`. While
/// the switch is off the group is not considered at all: no toggle, no
/// build, no cleanup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeatureSwitch {
    /// Value used when neither the command line nor the settings store sets one
    #[serde(default)]
    pub default: bool,

    /// Shown by `superbuild list`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
