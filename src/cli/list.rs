//! List declared dependencies with their effective toggles.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::OutputFormat;
use super::common::{CommandContext, GlobalOptions};
use crate::resolver::{EntryState, PlanEntry};

/// Command to list dependencies, their toggle values and where those came from.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only show dependencies enabled for this run
    #[arg(long)]
    enabled: bool,
}

impl ListCommand {
    /// # Errors
    ///
    /// Configuration and plan errors
    pub async fn execute(self, options: GlobalOptions) -> Result<()> {
        let ctx = CommandContext::load(&options)?;
        let (_store, plan) = ctx.plan(&options)?;

        let entries: Vec<&PlanEntry> = plan
            .entries
            .iter()
            .filter(|e| !self.enabled || e.state == EntryState::Enabled)
            .collect();

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
            OutputFormat::Text => {
                if entries.is_empty() {
                    println!("No dependencies found.");
                    return Ok(());
                }
                let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
                for entry in entries {
                    println!("{}", format_entry(entry, width));
                }
            }
        }
        Ok(())
    }
}

fn format_entry(entry: &PlanEntry, width: usize) -> String {
    let state = match entry.state {
        EntryState::Enabled => "ON ".green(),
        EntryState::Disabled => "OFF".red(),
        EntryState::Excluded => "---".dimmed(),
    };
    let mut line = format!("{state} {:<width$}  {:<12}  {}", entry.name, entry.origin, entry.source);
    if let Some(feature) = &entry.feature {
        line.push_str(&format!("  [{feature}]"));
    }
    if let Some(reason) = &entry.reason {
        line.push_str(&format!("  ({reason})"));
    }
    line
}
