//! Dashboards and leaderboards.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::id_resolver::Entity;
use crate::cli::output::{output, short_id, table, CommandOutput};
use crate::services::reporting::{LeaderboardEntry, Overview, SprintBucket, SquadStats};
use crate::services::PeriodFilter;

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Organization totals and guild level
    Overview {
        /// Restrict to one sprint
        #[arg(long)]
        sprint: Option<u32>,
    },
    /// Rank members, or squads with --squads
    Leaderboard {
        #[arg(long)]
        squads: bool,
        /// Restrict to one sprint
        #[arg(long)]
        sprint: Option<u32>,
    },
    /// Points, cycles and average ratings per sprint
    Sprints,
    /// Stats and team level of one squad
    Squad {
        /// Squad ID or prefix
        id: String,
        /// Restrict to one sprint
        #[arg(long)]
        sprint: Option<u32>,
    },
}

fn period(sprint: Option<u32>) -> PeriodFilter {
    sprint.map_or(PeriodFilter::All, PeriodFilter::Sprint)
}

fn rating(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[derive(Debug, Serialize)]
pub struct OverviewOutput {
    pub period: PeriodFilter,
    #[serde(flatten)]
    pub overview: Overview,
}

impl CommandOutput for OverviewOutput {
    fn to_human(&self) -> String {
        let o = &self.overview;
        let scope = match self.period {
            PeriodFilter::All => "All time".to_string(),
            PeriodFilter::Sprint(n) => format!("Sprint {n}"),
        };
        let next = o
            .guild
            .next_band_xp
            .map_or_else(|| "max".to_string(), |xp| xp.to_string());
        [
            scope,
            format!("Tasks: {} ({} done)", o.task_count, o.done_count),
            format!("Planned PA: {}", o.planned_pa),
            format!("Completed PA: {}", o.completed_pa),
            format!("Average rating: {}", rating(o.average_rating)),
            format!(
                "Guild level {} ({} / {} XP, {:.0}%)",
                o.guild.level, o.guild.total_xp, next, o.guild.progress_percent
            ),
        ]
        .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardOutput {
    pub kind: &'static str,
    pub period: PeriodFilter,
    pub entries: Vec<LeaderboardEntry>,
}

impl CommandOutput for LeaderboardOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return format!("No {} to rank.", self.kind);
        }
        let mut t = table(["#", "ID", "Name", "PA"]);
        for entry in &self.entries {
            t.add_row(vec![
                entry.rank.to_string(),
                short_id(&entry.id),
                entry.name.clone(),
                entry.total_points.to_string(),
            ]);
        }
        t.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct SprintSeriesOutput {
    pub current: u32,
    pub sprints: Vec<SprintBucket>,
}

impl CommandOutput for SprintSeriesOutput {
    fn to_human(&self) -> String {
        if self.sprints.is_empty() {
            return format!("No graded cycles yet (current sprint {}).", self.current);
        }
        let mut t = table(["Sprint", "PA", "Cycles", "Avg complexity", "Avg AIM"]);
        for bucket in &self.sprints {
            t.add_row(vec![
                bucket.sprint.to_string(),
                bucket.points.to_string(),
                bucket.cycles.to_string(),
                format!("{:.2}", bucket.complexity_avg),
                rating(bucket.aim_avg),
            ]);
        }
        t.to_string()
    }
}

impl CommandOutput for SquadStats {
    fn to_human(&self) -> String {
        [
            format!("Squad: {}", self.name),
            format!("Planned PA: {}", self.planned_pa),
            format!("Completed PA: {} over {} cycle(s)", self.completed_pa, self.cycles),
            format!(
                "Team level {} ({}/{} XP, {:.0}%)",
                self.team.level,
                self.team.current_xp_in_level,
                self.team.next_level_threshold,
                self.team.progress_percent
            ),
            format!("Reputation: {}", rating(self.average_rating)),
        ]
        .join("\n")
    }
}

pub async fn execute(args: ReportArgs, actor: Option<&str>, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open().await?;

    let squad_id = match &args.command {
        ReportCommands::Squad { id, .. } => Some(ctx.resolve(Entity::Squad, id).await?),
        _ => None,
    };

    let guard = ctx.session(actor).await?;
    let session = &guard.session;

    match args.command {
        ReportCommands::Overview { sprint } => {
            let period = period(sprint);
            let overview = session
                .read(|service, state| service.reporter().overview(&state.buildings, period))
                .await;
            output(&OverviewOutput { period, overview }, json_mode);
        }
        ReportCommands::Leaderboard { squads, sprint } => {
            let period = period(sprint);
            let (kind, entries) = session
                .read(|service, state| {
                    let reporter = service.reporter();
                    if squads {
                        ("squads", reporter.squad_leaderboard(&state.squads, &state.buildings, period))
                    } else {
                        ("members", reporter.member_leaderboard(&state.members, &state.buildings, period))
                    }
                })
                .await;
            output(&LeaderboardOutput { kind, period, entries }, json_mode);
        }
        ReportCommands::Sprints => {
            let (current, sprints) = session
                .read(|service, state| (state.sprint.cycle, service.reporter().sprint_series(&state.buildings)))
                .await;
            output(&SprintSeriesOutput { current, sprints }, json_mode);
        }
        ReportCommands::Squad { sprint, .. } => {
            let squad_id = squad_id.ok_or_else(|| anyhow!("Squad ID is required"))?;
            let stats = session
                .read(|service, state| {
                    state
                        .squad(squad_id)
                        .map(|squad| service.reporter().squad_stats(squad, &state.buildings, period(sprint)))
                })
                .await
                .ok_or_else(|| anyhow!("Squad {squad_id} not found"))?;
            output(&stats, json_mode);
        }
    }

    guard.finish().await
}
