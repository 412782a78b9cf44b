//! Validate the manifest and its prerequisite graph.
//!
//! Nothing is fetched, built or written. A manifest that validates is one
//! `superbuild plan` can work with; toggle-dependent problems such as an
//! enabled dependency whose prerequisite is off are reported by `plan`
//! and `build`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::OutputFormat;
use super::common::{CommandContext, GlobalOptions};
use crate::resolver::DependencyGraph;

/// Command to validate `superbuild.toml`.
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Default, Serialize)]
struct ValidationResults {
    valid: bool,
    manifest: String,
    dependencies: usize,
    features: usize,
    build_order: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl ValidateCommand {
    /// # Errors
    ///
    /// The first validation error
    pub async fn execute(self, options: GlobalOptions) -> Result<()> {
        let result = CommandContext::load(&options).and_then(|ctx| {
            let order = DependencyGraph::from_specs(&ctx.manifest.dependencies).topological_order()?;
            Ok((ctx, order))
        });

        let (ctx, order) = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                if matches!(self.format, OutputFormat::Json) {
                    let results = ValidationResults {
                        errors: vec![format!("{e:#}")],
                        ..ValidationResults::default()
                    };
                    println!("{}", serde_json::to_string_pretty(&results)?);
                } else if !options.quiet {
                    println!("{} Manifest is invalid", "✗".red());
                }
                return Err(e);
            }
        };

        let results = ValidationResults {
            valid: true,
            manifest: ctx.manifest_path.display().to_string(),
            dependencies: ctx.manifest.dependencies.len(),
            features: ctx.manifest.features.len(),
            build_order: order,
            errors: Vec::new(),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
            OutputFormat::Text if !options.quiet => {
                println!(
                    "{} {} is valid ({} dependencies, {} feature switches)",
                    "✓".green(),
                    results.manifest,
                    results.dependencies,
                    results.features
                );
                if !results.build_order.is_empty() {
                    println!("  Build order: {}", results.build_order.join(" → "));
                }
            }
            OutputFormat::Text => {}
        }
        Ok(())
    }
}
