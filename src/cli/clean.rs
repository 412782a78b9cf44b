//! Remove build and install state of dependencies.
//!
//! Sources under `_sources/` are kept so a later build does not need to
//! fetch again; removing the intermediate location also removes the
//! stamps, so the next build starts that dependency from its fetch phase.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, GlobalOptions};
use crate::core::SuperbuildError;
use crate::installer::BuildLock;
use crate::installer::cleanup::remove_existing;
use crate::resolver::RunPaths;

/// Command to clean named (or all) dependencies.
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Dependencies to clean
    #[arg(value_name = "NAME", required_unless_present = "all")]
    names: Vec<String>,

    /// Clean every declared dependency
    #[arg(long, conflicts_with = "names")]
    all: bool,
}

impl CleanCommand {
    /// # Errors
    ///
    /// Unknown dependency names, a held lock and filesystem errors
    pub async fn execute(self, options: GlobalOptions) -> Result<()> {
        let ctx = CommandContext::load(&options)?;

        let names: Vec<String> = if self.all {
            ctx.manifest.dependencies.iter().map(|d| d.name.clone()).collect()
        } else {
            for name in &self.names {
                if ctx.manifest.get(name).is_none() {
                    let suggestion = ctx
                        .manifest
                        .closest_name(name)
                        .map(|s| format!("; did you mean '{s}'?"))
                        .unwrap_or_default();
                    return Err(SuperbuildError::InvalidDependency {
                        name: name.clone(),
                        reason: format!("not declared in the manifest{suggestion}"),
                    }
                    .into());
                }
            }
            self.names
        };

        let _lock = BuildLock::acquire(&ctx.binary_root).await?;
        let store = ctx.store_with(&options)?;
        let settings = ctx.settings(&store)?;
        let paths = RunPaths {
            binary_root: ctx.binary_root.clone(),
            install_root: settings.install_root().to_path_buf(),
            default_install_root: settings.default_install_prefix.clone(),
        };

        let targets = names
            .iter()
            .map(|name| paths.layout(name))
            .flat_map(|layout| [layout.binary_dir, layout.install_dir])
            .collect();
        let removed = remove_existing(targets).await?;

        if !options.quiet {
            if removed.is_empty() {
                println!("Nothing to clean.");
            }
            for path in &removed {
                println!("{} {}", "Removed".yellow(), path.display());
            }
        }
        Ok(())
    }
}
