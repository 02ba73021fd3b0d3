//! Member CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::id_resolver::{resolve_optional, Entity};
use crate::cli::output::{output, short_id, table, ActionOutput, CommandOutput};
use crate::domain::models::{Member, ProgressionProfile, Role};

#[derive(Args, Debug)]
pub struct MemberArgs {
    #[command(subcommand)]
    pub command: MemberCommands,
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Register a member
    Add {
        name: String,
        /// Role (master, mentor, executor)
        #[arg(short, long, default_value = "executor")]
        role: String,
        /// Squad ID or prefix
        #[arg(short, long)]
        squad: Option<String>,
    },
    /// List members with their level and points
    List,
    /// Show a member's progression
    Show {
        /// Member ID or prefix
        id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct MemberRow {
    pub member: Member,
    pub profile: Option<ProgressionProfile>,
}

#[derive(Debug, Serialize)]
pub struct MemberListOutput {
    pub members: Vec<MemberRow>,
    pub total: usize,
}

impl CommandOutput for MemberListOutput {
    fn to_human(&self) -> String {
        if self.members.is_empty() {
            return "No members found.".to_string();
        }
        let mut t = table(["ID", "Name", "Role", "Level", "Points", "Coins"]);
        for row in &self.members {
            let (level, points, coins) = row
                .profile
                .as_ref()
                .map_or((1, 0, 0), |p| (p.level, p.total_points, p.coins));
            t.add_row(vec![
                short_id(&row.member.id),
                row.member.name.clone(),
                row.member.role.to_string(),
                level.to_string(),
                points.to_string(),
                coins.to_string(),
            ]);
        }
        t.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct MemberDetailOutput {
    pub member: Member,
    pub profile: ProgressionProfile,
    pub progress_percent: f64,
}

impl CommandOutput for MemberDetailOutput {
    fn to_human(&self) -> String {
        let p = &self.profile;
        [
            format!("Member: {}", self.member.name),
            format!("ID: {}", self.member.id),
            format!("Role: {}", self.member.role),
            format!(
                "Level {} ({}/{} XP, {:.0}%)",
                p.level, p.current_xp, p.next_level_xp, self.progress_percent
            ),
            format!("Points: {}", p.total_points),
            format!("Coins: {}", p.coins),
            format!("Reputation: {:.2}", p.reputation),
        ]
        .join("\n")
    }
}

pub async fn execute(args: MemberArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open().await?;

    match args.command {
        MemberCommands::Add { name, role, squad } => {
            if name.trim().is_empty() {
                anyhow::bail!("Member name cannot be empty");
            }
            let role = Role::from_str(&role).ok_or_else(|| anyhow!("Invalid role: {role}"))?;
            let squad_id = resolve_optional(&ctx.pool, Entity::Squad, squad.as_deref()).await?;

            let mut member = Member::new(name, role);
            member.squad_id = squad_id;
            ctx.repos.profiles.save_member(&member).await?;
            output(
                &ActionOutput::ok(format!("Member '{}' added ({})", member.name, member.id), member),
                json_mode,
            );
        }
        MemberCommands::List => {
            let members = ctx.repos.profiles.list_members().await?;
            let profiles = ctx.repos.profiles.list_profiles().await?;
            let members: Vec<MemberRow> = members
                .into_iter()
                .map(|member| {
                    let profile = profiles.iter().find(|p| p.member_id == member.id).cloned();
                    MemberRow { member, profile }
                })
                .collect();
            let total = members.len();
            output(&MemberListOutput { members, total }, json_mode);
        }
        MemberCommands::Show { id } => {
            let id = ctx.resolve(Entity::Member, &id).await?;
            let member = ctx
                .repos
                .profiles
                .get_member(id)
                .await?
                .ok_or_else(|| anyhow!("Member {id} not found"))?;
            let engine = crate::services::ProgressionEngine::new(ctx.config.progression.clone());
            let profile = ctx
                .repos
                .profiles
                .get_profile(id)
                .await?
                .unwrap_or_else(|| engine.new_profile(id));
            #[allow(clippy::cast_precision_loss)]
            let progress_percent = profile.current_xp as f64 / profile.next_level_xp.max(1) as f64 * 100.0;
            output(
                &MemberDetailOutput {
                    member,
                    profile,
                    progress_percent,
                },
                json_mode,
            );
        }
    }
    Ok(())
}
