//! Squad CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::{output, short_id, table, ActionOutput, CommandOutput};
use crate::domain::models::Squad;

#[derive(Args, Debug)]
pub struct SquadArgs {
    #[command(subcommand)]
    pub command: SquadCommands,
}

#[derive(Subcommand, Debug)]
pub enum SquadCommands {
    /// Create a squad
    Create {
        name: String,
        /// Display color
        #[arg(short, long, default_value = "#4f46e5")]
        color: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List squads
    List,
}

#[derive(Debug, Serialize)]
pub struct SquadListOutput {
    pub squads: Vec<Squad>,
    pub total: usize,
}

impl CommandOutput for SquadListOutput {
    fn to_human(&self) -> String {
        if self.squads.is_empty() {
            return "No squads found.".to_string();
        }
        let mut t = table(["ID", "Name", "Color", "Description"]);
        for squad in &self.squads {
            t.add_row(vec![
                short_id(&squad.id),
                squad.name.clone(),
                squad.color.clone(),
                squad.description.clone().unwrap_or_default(),
            ]);
        }
        t.to_string()
    }
}

pub async fn execute(args: SquadArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open().await?;

    match args.command {
        SquadCommands::Create {
            name,
            color,
            description,
        } => {
            if name.trim().is_empty() {
                anyhow::bail!("Squad name cannot be empty");
            }
            let mut squad = Squad::new(name, color);
            squad.description = description;
            ctx.repos.squads.save(&squad).await?;
            output(
                &ActionOutput::ok(format!("Squad '{}' created ({})", squad.name, squad.id), squad),
                json_mode,
            );
        }
        SquadCommands::List => {
            let squads = ctx.repos.squads.list().await?;
            let total = squads.len();
            output(&SquadListOutput { squads, total }, json_mode);
        }
    }
    Ok(())
}
