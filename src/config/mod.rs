//! Run configuration: command-line definitions, the persisted settings
//! store, and the build settings derived from them.
//!
//! Precedence, highest first:
//! 1. `-D KEY=VALUE` on this invocation's command line
//! 2. values remembered in `<binaryRoot>/_superbuild-cache.toml`
//! 3. defaults declared in `superbuild.toml`
//!
//! Forced-off toggles (a dependency whose required feature switch is off)
//! override all three; that rule lives in the resolver.

pub mod definitions;
pub mod parser;
pub mod settings;
pub mod store;

pub use definitions::{Definition, format_bool, parse_bool, parse_definition};
pub use settings::{BuildSettings, TargetOs, default_install_prefix, select_build_type};
pub use store::{SettingsStore, StoredOrigin};
