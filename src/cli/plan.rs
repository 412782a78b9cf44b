//! Show what a build would do without doing it.
//!
//! The plan is computed with this invocation's definitions applied in
//! memory; the settings store is not written.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::OutputFormat;
use super::common::{CommandContext, GlobalOptions};
use crate::resolver::{EntryState, Phase, Plan};

/// Command to print the ordered build plan.
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl PlanCommand {
    /// # Errors
    ///
    /// Configuration and plan errors
    pub async fn execute(self, options: GlobalOptions) -> Result<()> {
        let ctx = CommandContext::load(&options)?;
        let (_store, plan) = ctx.plan(&options)?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Text => print!("{}", render_text(&plan)),
        }
        Ok(())
    }
}

/// Human-readable plan.
#[must_use]
pub fn render_text(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n{} {}\n",
        "Binary root:".bold(),
        plan.paths.binary_root.display(),
        "Install root:".bold(),
        plan.paths.install_root.display()
    ));
    for feature in &plan.features {
        out.push_str(&format!(
            "{} {} = {} ({})\n",
            "Feature".bold(),
            feature.name,
            if feature.enabled { "ON" } else { "OFF" },
            feature.origin
        ));
    }

    for (index, task) in plan.tasks.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", index + 1, task.name.green().bold()));
        if !task.prerequisites.is_empty() {
            out.push_str(&format!("   after: {}\n", task.prerequisites.join(", ")));
        }
        out.push_str(&format!("   source:  {}\n", task.layout.source_dir.display()));
        out.push_str(&format!("   build:   {}\n", task.layout.build_dir.display()));
        out.push_str(&format!("   install: {}\n", task.layout.install_dir.display()));
        if !task.arguments.is_empty() {
            out.push_str("   arguments:\n");
            for arg in task.arguments.iter() {
                out.push_str(&format!("     {arg}\n"));
            }
        }
        for phase in Phase::ALL {
            let steps = task.steps(phase);
            if steps.is_empty() {
                continue;
            }
            out.push_str(&format!("   {phase}:\n"));
            for step in steps {
                out.push_str(&format!("     {}\n", step.describe()));
            }
        }
    }

    let skipped: Vec<_> =
        plan.entries.iter().filter(|e| e.state != EntryState::Enabled).collect();
    if !skipped.is_empty() {
        out.push_str(&format!("\n{}\n", "Not built:".bold()));
        for entry in skipped {
            out.push_str(&format!(
                "   {} ({}: {})\n",
                entry.name,
                entry.state.as_str(),
                entry.reason.as_deref().unwrap_or("toggled off")
            ));
        }
    }
    out
}
