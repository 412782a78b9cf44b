//! `-D KEY=VALUE` definitions.
//!
//! Definitions use the build tool's own syntax so that operators can pass
//! the same values to superbuild they would pass to CMake: an optional type
//! annotation (`KEY:BOOL=ON`) is accepted and ignored, and booleans accept
//! every spelling CMake does.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::SuperbuildError;

/// One `KEY=VALUE` definition from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub key: String,
    pub value: String,
}

impl Definition {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Interpret the value as a boolean.
    ///
    /// # Errors
    ///
    /// [`SuperbuildError::InvalidDefinition`] when the value is not a
    /// recognized boolean spelling.
    pub fn as_bool(&self) -> Result<bool, SuperbuildError> {
        parse_bool(&self.value).ok_or_else(|| SuperbuildError::InvalidDefinition {
            definition: self.to_string(),
            reason: "expected a boolean (ON/OFF, TRUE/FALSE, YES/NO, 1/0)".to_string(),
        })
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for Definition {
    type Err = SuperbuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SuperbuildError::InvalidDefinition {
            definition: s.to_string(),
            reason: reason.to_string(),
        };

        let (lhs, value) = s.split_once('=').ok_or_else(|| invalid("missing '='"))?;
        let key = lhs.split_once(':').map_or(lhs, |(key, _kind)| key).trim();
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(invalid("keys cannot contain whitespace"));
        }
        Ok(Self::new(key, value))
    }
}

/// clap value parser for `-D`.
pub fn parse_definition(s: &str) -> Result<Definition, String> {
    s.parse::<Definition>().map_err(|e| e.to_string())
}

/// Parse a boolean the way CMake does: `ON/OFF`, `TRUE/FALSE`, `YES/NO`,
/// `Y/N`, `1/0`, case-insensitive.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "ON" | "TRUE" | "YES" | "Y" | "1" => Some(true),
        "OFF" | "FALSE" | "NO" | "N" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Canonical rendering of a boolean value.
#[must_use]
pub const fn format_bool(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}
