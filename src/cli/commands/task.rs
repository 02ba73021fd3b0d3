//! Task CLI commands.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::cli::context::CliContext;
use crate::cli::id_resolver::{resolve, resolve_optional, Entity};
use crate::cli::output::{output, short_id, table, truncate, ActionOutput, CommandOutput};
use crate::domain::models::{RecurrenceMode, Task, TaskStatus};
use crate::services::board::GradeOutcome;
use crate::services::{task_points, CycleOutcome, GradeRequest, NewTask, RenewalDecision, RuleChoice, TaskUpdate};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

/// Rule selection shared by `create` and `update`.
#[derive(Args, Debug, Default)]
pub struct RuleArgs {
    /// Collaboration rule (integrated, negotiated, fixed)
    #[arg(long)]
    pub rule: Option<String>,
    /// Cycles before a fixed routine asks for renewal
    #[arg(long)]
    pub limit: Option<u32>,
    /// Deadline of a fixed routine (YYYY-MM-DD or RFC3339)
    #[arg(long)]
    pub deadline: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task on a project building
    Create {
        /// Card title
        content: String,
        /// Building ID or prefix
        #[arg(short, long)]
        building: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Size, one of 1, 2, 3, 5, 8, 13, 21
        #[arg(long)]
        size: Option<u32>,
        /// Complexity 1-3
        #[arg(long)]
        complexity: Option<u8>,
        #[command(flatten)]
        rule: RuleArgs,
        /// Participant member IDs or prefixes (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        participants: Vec<String>,
        /// Squad ID or prefix
        #[arg(short, long)]
        squad: Option<String>,
    },
    /// List tasks
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Building ID or prefix
        #[arg(short, long)]
        building: Option<String>,
        /// Squad ID or prefix
        #[arg(short, long)]
        squad: Option<String>,
        /// Only tasks involving the acting member
        #[arg(long)]
        mine: bool,
        /// Only routines waiting for a renewal decision
        #[arg(long)]
        pending: bool,
    },
    /// Show task details
    Show {
        /// Task ID or prefix
        id: String,
    },
    /// Move a task to another lane
    Move {
        /// Task ID or prefix
        id: String,
        /// Target lane (backlog, todo, doing, blocked, review)
        status: String,
    },
    /// Edit a task
    Update {
        /// Task ID or prefix
        id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        size: Option<u32>,
        #[arg(long)]
        complexity: Option<u8>,
        #[command(flatten)]
        rule: RuleArgs,
        /// Replace participants (comma-separated IDs or prefixes)
        #[arg(long, value_delimiter = ',')]
        participants: Option<Vec<String>>,
        /// Negotiated share as member=points; repeat for each participant
        #[arg(long = "share")]
        shares: Vec<String>,
        /// Assignee ID or prefix
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        evidence: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        reflections: Option<String>,
        /// Draft rating
        #[arg(long)]
        aim: Option<u8>,
        /// Draft feedback
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Grade a task in review
    Grade {
        /// Task ID or prefix
        id: String,
        /// Rating; the draft rating or the neutral rating when omitted
        #[arg(long)]
        aim: Option<u8>,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Renew or close a routine waiting for a decision
    Renew {
        /// Task ID or prefix
        id: String,
        /// Close the routine instead of renewing it
        #[arg(long)]
        decline: bool,
    },
    /// Delete a task
    Delete {
        /// Task ID or prefix
        id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub content: String,
    pub status: TaskStatus,
    pub rule: String,
    pub size: u32,
    pub complexity: u8,
    pub points: u64,
    pub cycles: usize,
    pub pending_renewal: bool,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            content: task.content.clone(),
            status: task.status,
            rule: task.rule_kind().label().to_string(),
            size: task.size,
            complexity: task.complexity,
            points: task_points(task),
            cycles: task.history.len(),
            pending_renewal: task.pending_renewal().is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut t = table(["ID", "Task", "Lane", "Rule", "Size", "Cx", "PA", "Cycles"]);
        for task in &self.tasks {
            let lane = if task.pending_renewal {
                format!("{} (renewal)", task.status.lane_label())
            } else {
                task.status.lane_label().to_string()
            };
            t.add_row(vec![
                short_id(&task.id),
                truncate(&task.content, 40),
                lane,
                task.rule.clone(),
                task.size.to_string(),
                task.complexity.to_string(),
                task.points.to_string(),
                task.cycles.to_string(),
            ]);
        }
        format!("{t}\n{} task(s)", self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct TaskDetailOutput {
    pub task: Task,
    pub points: u64,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let task = &self.task;
        let mut lines = vec![
            format!("Task: {}", task.content),
            format!("ID: {}", task.id),
            format!("Lane: {}", task.status.lane_label()),
            format!("Rule: {} (x{})", task.rule_kind().label(), task.rule_multiplier),
            format!("Size {} x complexity {} = {} PA", task.size, task.complexity, self.points),
            format!("Participants: {}", task.participants.len()),
        ];
        if let Some(description) = &task.description {
            lines.push(format!("Description: {description}"));
        }
        if let Some(recurrence) = task.rule.recurrence() {
            let limit = match (recurrence.mode, recurrence.quantity_limit, recurrence.deadline) {
                (RecurrenceMode::Quantity, Some(limit), _) => format!("{}/{limit} cycles", recurrence.cycle_count),
                (RecurrenceMode::Deadline, _, Some(deadline)) => format!(
                    "{} cycles, until {}",
                    recurrence.cycle_count,
                    deadline.format("%Y-%m-%d")
                ),
                _ => format!("{} cycles", recurrence.cycle_count),
            };
            lines.push(format!("Routine: {limit}"));
            if let Some(trigger) = recurrence.pending_renewal {
                lines.push(format!("Waiting for renewal ({} limit reached)", trigger.as_str()));
            }
            if recurrence.closed {
                lines.push("Routine closed".to_string());
            }
        }
        if !task.sprint_history.is_empty() {
            let sprints: Vec<String> = task.sprint_history.iter().map(|s| Task::sprint_label(*s)).collect();
            lines.push(format!("Sprints: {}", sprints.join(", ")));
        }
        if !task.history.is_empty() {
            lines.push("\nHistory:".to_string());
            for entry in &task.history {
                lines.push(format!(
                    "  {}  {}  AIM {}  {} PA  {} XP",
                    entry.timestamp.format("%Y-%m-%d"),
                    Task::sprint_label(entry.sprint),
                    entry.aim,
                    entry.points,
                    entry.xp
                ));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct GradeOutput {
    #[serde(flatten)]
    pub outcome: GradeOutcome,
}

impl CommandOutput for GradeOutput {
    fn to_human(&self) -> String {
        let plan = &self.outcome.plan;
        let mut lines = vec![format!(
            "Graded '{}': AIM {} (x{}), {} PA, {} XP, {} coins",
            self.outcome.task.content, plan.aim, plan.multiplier, plan.final_pa, plan.final_xp, plan.final_coins
        )];
        for award in &plan.awards {
            lines.push(format!(
                "  {}  {} PA  {} XP  {} coins",
                short_id(&award.participant_id),
                award.points,
                award.xp,
                award.coins
            ));
        }
        lines.push(format!("Capacity used: {}", plan.capacity_total));
        lines.push(match plan.outcome {
            CycleOutcome::Completed => "Task completed.".to_string(),
            CycleOutcome::Recycled { cycle_count } => {
                format!("Routine returned to backlog (cycle {cycle_count}).")
            }
            CycleOutcome::RenewalRequired { cycle_count, trigger } => format!(
                "Routine reached its {} limit after {cycle_count} cycle(s); renew or decline it.",
                trigger.as_str()
            ),
        });
        if let Some(change) = self.outcome.level_change.filter(|c| c.to > c.from) {
            lines.push(format!("Level up! {} -> {}", change.from, change.to));
        }
        lines.join("\n")
    }
}

fn parse_status(value: &str) -> Result<TaskStatus> {
    TaskStatus::from_str(value).ok_or_else(|| anyhow!("Invalid status: {value}"))
}

fn parse_deadline(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid deadline '{value}': use YYYY-MM-DD or RFC3339"))?;
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("Invalid deadline '{value}'"))
}

fn parse_rule(args: &RuleArgs) -> Result<Option<RuleChoice>> {
    let Some(rule) = args.rule.as_deref() else {
        if args.limit.is_some() || args.deadline.is_some() {
            bail!("--limit and --deadline need --rule fixed");
        }
        return Ok(None);
    };
    let choice = match rule.to_lowercase().as_str() {
        "integrated" | "i" => RuleChoice::Integrated,
        "negotiated" | "n" => RuleChoice::Negotiated,
        "fixed" | "f" => {
            let deadline = args.deadline.as_deref().map(parse_deadline).transpose()?;
            let mode = if deadline.is_some() {
                RecurrenceMode::Deadline
            } else {
                RecurrenceMode::Quantity
            };
            RuleChoice::Fixed {
                mode,
                quantity_limit: args.limit,
                deadline,
            }
        }
        other => bail!("Invalid rule: {other}"),
    };
    Ok(Some(choice))
}

async fn resolve_members(pool: &SqlitePool, prefixes: &[String]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        ids.push(resolve(pool, Entity::Member, prefix.trim()).await?);
    }
    Ok(ids)
}

async fn parse_shares(pool: &SqlitePool, shares: &[String]) -> Result<Option<BTreeMap<Uuid, u64>>> {
    if shares.is_empty() {
        return Ok(None);
    }
    let mut distribution = BTreeMap::new();
    for share in shares {
        let (member, points) = share
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid share '{share}': use member=points"))?;
        let id = resolve(pool, Entity::Member, member.trim()).await?;
        let points: u64 = points
            .trim()
            .parse()
            .with_context(|| format!("Invalid points in share '{share}'"))?;
        distribution.insert(id, points);
    }
    Ok(Some(distribution))
}

pub async fn execute(args: TaskArgs, actor: Option<&str>, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open().await?;

    match args.command {
        TaskCommands::Create {
            content,
            building,
            description,
            size,
            complexity,
            rule,
            participants,
            squad,
        } => {
            let input = NewTask {
                building_id: Some(ctx.resolve(Entity::Building, &building).await?),
                content,
                description,
                size,
                complexity,
                rule: parse_rule(&rule)?,
                participants: resolve_members(&ctx.pool, &participants).await?,
                squad_id: resolve_optional(&ctx.pool, Entity::Squad, squad.as_deref()).await?,
            };
            let guard = ctx.acting_session(actor).await?;
            let task = guard
                .session
                .execute(|service, state| service.create_task(state, input))
                .await?;
            guard.finish().await?;
            output(
                &ActionOutput::ok(format!("Task created ({})", task.id), TaskSummary::from(&task)),
                json_mode,
            );
        }
        TaskCommands::List {
            status,
            building,
            squad,
            mine,
            pending,
        } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let building_id = resolve_optional(&ctx.pool, Entity::Building, building.as_deref()).await?;
            let squad_id = resolve_optional(&ctx.pool, Entity::Squad, squad.as_deref()).await?;
            let guard = if mine {
                ctx.acting_session(actor).await?
            } else {
                ctx.session(actor).await?
            };

            let tasks: Vec<TaskSummary> = guard
                .session
                .read(|service, state| {
                    let candidates: Vec<&Task> = match (mine, squad_id, &state.actor) {
                        (true, _, Some(member)) => service.member_tasks(state, member.id),
                        (_, Some(squad_id), _) => service.squad_tasks(state, squad_id),
                        _ => state.tasks().collect(),
                    };
                    candidates
                        .into_iter()
                        .filter(|t| building_id.is_none_or(|id| t.building_id == id))
                        .filter(|t| status.is_none_or(|s| t.status == s))
                        .filter(|t| !pending || t.pending_renewal().is_some())
                        .map(TaskSummary::from)
                        .collect()
                })
                .await;
            guard.finish().await?;

            let total = tasks.len();
            output(&TaskListOutput { tasks, total }, json_mode);
        }
        TaskCommands::Show { id } => {
            let id = ctx.resolve(Entity::Task, &id).await?;
            let task = ctx
                .repos
                .tasks
                .get(id)
                .await?
                .ok_or_else(|| anyhow!("Task {id} not found"))?;
            let points = task_points(&task);
            output(&TaskDetailOutput { task, points }, json_mode);
        }
        TaskCommands::Move { id, status } => {
            let id = ctx.resolve(Entity::Task, &id).await?;
            let to = parse_status(&status)?;
            let guard = ctx.session(actor).await?;
            let task = guard
                .session
                .execute(|service, state| service.move_task(state, id, to))
                .await?;
            guard.finish().await?;
            output(
                &ActionOutput::ok(
                    format!("'{}' moved to {}", task.content, task.status.lane_label()),
                    TaskSummary::from(&task),
                ),
                json_mode,
            );
        }
        TaskCommands::Update {
            id,
            content,
            description,
            size,
            complexity,
            rule,
            participants,
            shares,
            assignee,
            evidence,
            notes,
            reflections,
            aim,
            feedback,
        } => {
            let id = ctx.resolve(Entity::Task, &id).await?;
            let participants = match participants {
                Some(prefixes) => Some(resolve_members(&ctx.pool, &prefixes).await?),
                None => None,
            };
            let update = TaskUpdate {
                content,
                description,
                size,
                complexity,
                rule: parse_rule(&rule)?,
                participants,
                distribution: parse_shares(&ctx.pool, &shares).await?,
                assignee_id: resolve_optional(&ctx.pool, Entity::Member, assignee.as_deref()).await?,
                evidence_link: evidence,
                delivery_notes: notes,
                reflections,
                aim,
                feedback,
            };
            let guard = ctx.session(actor).await?;
            let task = guard
                .session
                .execute(|service, state| service.update_task(state, id, update))
                .await?;
            guard.finish().await?;
            output(
                &ActionOutput::ok(format!("'{}' updated", task.content), TaskSummary::from(&task)),
                json_mode,
            );
        }
        TaskCommands::Grade { id, aim, feedback } => {
            let id = ctx.resolve(Entity::Task, &id).await?;
            let guard = ctx.acting_session(actor).await?;
            let outcome = guard
                .session
                .execute(|service, state| service.grade_task(state, id, GradeRequest { aim, feedback }, Utc::now()))
                .await?;
            guard.finish().await?;
            output(&GradeOutput { outcome }, json_mode);
        }
        TaskCommands::Renew { id, decline } => {
            let id = ctx.resolve(Entity::Task, &id).await?;
            let decision = if decline {
                RenewalDecision::Decline
            } else {
                RenewalDecision::Renew
            };
            let guard = ctx.acting_session(actor).await?;
            let task = guard
                .session
                .execute(|service, state| service.resolve_renewal(state, id, decision))
                .await?;
            guard.finish().await?;
            let message = if decline {
                format!("Routine '{}' closed", task.content)
            } else {
                format!("Routine '{}' renewed", task.content)
            };
            output(&ActionOutput::ok(message, TaskSummary::from(&task)), json_mode);
        }
        TaskCommands::Delete { id } => {
            let id = ctx.resolve(Entity::Task, &id).await?;
            let guard = ctx.session(actor).await?;
            let task = guard
                .session
                .execute(|service, state| service.delete_task(state, id))
                .await?;
            guard.finish().await?;
            output(
                &ActionOutput::ok(format!("Task '{}' deleted", task.content), TaskSummary::from(&task)),
                json_mode,
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_fixed_with_deadline() {
        let args = RuleArgs {
            rule: Some("fixed".to_string()),
            limit: None,
            deadline: Some("2026-03-01".to_string()),
        };
        match parse_rule(&args).unwrap() {
            Some(RuleChoice::Fixed { mode, deadline, .. }) => {
                assert_eq!(mode, RecurrenceMode::Deadline);
                assert_eq!(deadline.unwrap().format("%Y-%m-%d").to_string(), "2026-03-01");
            }
            other => panic!("Expected fixed rule, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rule_requires_rule_for_limits() {
        let args = RuleArgs {
            rule: None,
            limit: Some(3),
            deadline: None,
        };
        assert!(parse_rule(&args).is_err());
        assert!(parse_rule(&RuleArgs::default()).unwrap().is_none());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("review").unwrap(), TaskStatus::Review);
        assert!(parse_status("shipping").is_err());
    }
}
