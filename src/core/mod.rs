//! Core types shared by every superbuild module
//!
//! At the moment this is the error layer:
//! - **Strongly-typed errors** ([`SuperbuildError`]) for the failures the
//!   orchestrator can describe precisely
//! - **User-facing contexts** ([`ErrorContext`]) carrying details and a
//!   suggestion, printed by the binary with colors
//!
//! ```rust,no_run
//! use superbuild_cli::core::{SuperbuildError, user_friendly_error};
//!
//! fn run() -> anyhow::Result<()> {
//!     Err(SuperbuildError::ManifestNotFound.into())
//! }
//!
//! if let Err(e) = run() {
//!     user_friendly_error(e).display();
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, SuperbuildError, user_friendly_error};
