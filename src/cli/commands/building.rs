//! Building CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::id_resolver::{resolve_optional, Entity};
use crate::cli::output::{output, short_id, table, ActionOutput, CommandOutput};
use crate::domain::models::{Building, BuildingKind};
use crate::services::reporting::BuildingStats;
use crate::services::session::load_building;
use crate::services::{AggregationReporter, BoardService};

#[derive(Args, Debug)]
pub struct BuildingArgs {
    #[command(subcommand)]
    pub command: BuildingCommands,
}

#[derive(Subcommand, Debug)]
pub enum BuildingCommands {
    /// Construct a building
    Create {
        name: String,
        /// Kind (project, squad_hq, residential, tribal_center)
        #[arg(short, long, default_value = "project")]
        kind: String,
        /// Level, which sets the capacity ceiling
        #[arg(short, long, default_value = "1")]
        level: u32,
        /// Owning member ID or prefix (defaults to the actor)
        #[arg(short, long)]
        owner: Option<String>,
        /// Squad ID or prefix
        #[arg(short, long)]
        squad: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List buildings with their capacity usage
    List,
    /// Show capacity usage of one building
    Show {
        /// Building ID or prefix
        id: String,
    },
    /// Change a building's level
    Upgrade {
        /// Building ID or prefix
        id: String,
        /// New level
        level: u32,
    },
}

#[derive(Debug, Serialize)]
pub struct BuildingListOutput {
    pub buildings: Vec<BuildingView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct BuildingView {
    pub kind: BuildingKind,
    pub level: u32,
    #[serde(flatten)]
    pub stats: BuildingStats,
}

impl BuildingView {
    fn new(building: &Building, reporter: &AggregationReporter) -> Self {
        Self {
            kind: building.kind,
            level: building.level,
            stats: reporter.building_stats(building),
        }
    }
}

impl CommandOutput for BuildingListOutput {
    fn to_human(&self) -> String {
        if self.buildings.is_empty() {
            return "No buildings found.".to_string();
        }
        let mut t = table(["ID", "Name", "Kind", "Lvl", "Tasks", "PA used", "Ceiling", "%"]);
        for b in &self.buildings {
            t.add_row(vec![
                short_id(&b.stats.building_id),
                b.stats.name.clone(),
                b.kind.to_string(),
                b.level.to_string(),
                format!("{}/{}", b.stats.done_count, b.stats.task_count),
                b.stats.concluded_pa.to_string(),
                b.stats.ceiling.to_string(),
                format!("{:.0}", b.stats.percent_used),
            ]);
        }
        t.to_string()
    }
}

impl CommandOutput for BuildingView {
    fn to_human(&self) -> String {
        [
            format!("Building: {}", self.stats.name),
            format!("ID: {}", self.stats.building_id),
            format!("Kind: {}  Level: {}", self.kind, self.level),
            format!("Tasks: {} ({} done)", self.stats.task_count, self.stats.done_count),
            format!("Planned PA: {}", self.stats.planned_pa),
            format!(
                "Capacity: {}/{} ({:.0}%)",
                self.stats.concluded_pa, self.stats.ceiling, self.stats.percent_used
            ),
        ]
        .join("\n")
    }
}

pub async fn execute(args: BuildingArgs, actor: Option<&str>, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open().await?;
    let service = BoardService::new(ctx.config.clone());
    let reporter = service.reporter();

    match args.command {
        BuildingCommands::Create {
            name,
            kind,
            level,
            owner,
            squad,
            description,
        } => {
            let kind = BuildingKind::from_str(&kind).ok_or_else(|| anyhow!("Invalid building kind: {kind}"))?;
            let owner_id = resolve_optional(&ctx.pool, Entity::Member, owner.as_deref().or(actor))
                .await?
                .ok_or_else(|| anyhow!("A building needs an owner: pass --owner or --actor"))?;
            let squad_id = resolve_optional(&ctx.pool, Entity::Squad, squad.as_deref()).await?;

            let mut building = Building::new(name, kind, owner_id).with_level(level);
            building.squad_id = squad_id;
            building.description = description;
            building.validate().map_err(|e| anyhow!(e))?;

            ctx.repos.buildings.save(&building).await?;
            output(
                &ActionOutput::ok(
                    format!("{} '{}' built ({})", building.kind, building.name, building.id),
                    building,
                ),
                json_mode,
            );
        }
        BuildingCommands::List => {
            let mut buildings = Vec::new();
            for building in ctx.repos.buildings.list().await? {
                let loaded = load_building(&ctx.repos, building.id).await?;
                buildings.push(BuildingView::new(&loaded, reporter));
            }
            let total = buildings.len();
            output(&BuildingListOutput { buildings, total }, json_mode);
        }
        BuildingCommands::Show { id } => {
            let id = ctx.resolve(Entity::Building, &id).await?;
            let building = load_building(&ctx.repos, id).await?;
            output(&BuildingView::new(&building, reporter), json_mode);
        }
        BuildingCommands::Upgrade { id, level } => {
            let id = ctx.resolve(Entity::Building, &id).await?;
            let mut building = ctx
                .repos
                .buildings
                .get(id)
                .await?
                .ok_or_else(|| anyhow!("Building {id} not found"))?;
            building.level = level;
            building.validate().map_err(|e| anyhow!(e))?;
            ctx.repos.buildings.save(&building).await?;
            output(
                &ActionOutput::ok(format!("'{}' is now level {}", building.name, level), building),
                json_mode,
            );
        }
    }
    Ok(())
}
