//! Sprint clock commands.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::{output, CommandOutput};

#[derive(Args, Debug)]
pub struct SprintArgs {
    #[command(subcommand)]
    pub command: SprintCommands,
}

#[derive(Subcommand, Debug)]
pub enum SprintCommands {
    /// Show the current sprint
    Status,
    /// Catch the clock up with every elapsed sprint
    Advance,
}

#[derive(Debug, Serialize)]
pub struct SprintOutput {
    pub cycle: u32,
    pub started_at: DateTime<Utc>,
    pub duration_days: i64,
    pub days_remaining: i64,
    /// Sprints skipped by this call, for `advance`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<u32>,
}

impl CommandOutput for SprintOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Sprint {}", self.cycle),
            format!("Started: {}", self.started_at.format("%Y-%m-%d %H:%M UTC")),
            format!("Days remaining: {} of {}", self.days_remaining, self.duration_days),
        ];
        match self.advanced {
            Some(0) => lines.push("Clock already current.".to_string()),
            Some(n) => lines.push(format!("Advanced {n} sprint(s).")),
            None => {}
        }
        lines.join("\n")
    }
}

pub async fn execute(args: SprintArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open().await?;
    let stored = ctx.repos.app_state.get_sprint().await?.map(|clock| clock.cycle);

    // Opening a session already catches the clock up
    let guard = ctx.session(None).await?;
    let advanced = match args.command {
        SprintCommands::Status => None,
        SprintCommands::Advance => {
            guard
                .session
                .execute(|service, state| Ok(service.advance_sprint(state, Utc::now())))
                .await?;
            let cycle = guard.session.read(|_, state| state.sprint.cycle).await;
            Some(cycle.saturating_sub(stored.unwrap_or(cycle)))
        }
    };

    let now = Utc::now();
    let status = guard
        .session
        .read(|service, state| {
            let duration = service.sprint_duration();
            SprintOutput {
                cycle: state.sprint.cycle,
                started_at: state.sprint.started_at,
                duration_days: duration.num_days(),
                days_remaining: state.sprint.days_remaining(now, duration),
                advanced,
            }
        })
        .await;
    guard.finish().await?;

    output(&status, json_mode);
    Ok(())
}
