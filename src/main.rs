//! superbuild CLI entry point
//!
//! Parses the command line, runs the selected command and renders errors
//! with context and suggestions.
//!
//! - `build` - Build every enabled dependency into the install root
//! - `plan` - Show the ordered plan without executing it
//! - `list` - List dependencies with their toggle values
//! - `validate` - Validate superbuild.toml
//! - `clean` - Remove build and install state of dependencies

use anyhow::Result;
use clap::Parser;
use superbuild_cli::cli;
use superbuild_cli::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
