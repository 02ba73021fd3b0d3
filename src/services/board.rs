//! Board state and the operations that mutate it.
//!
//! [`BoardState`] is the in-memory view of everything a session works on.
//! [`BoardService`] mutates it synchronously and returns the persistence
//! commands the caller must queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, GradingError};
use crate::domain::models::{
    Building, BuildingKind, CollaborationRule, Config, Member, ProgressionProfile, Recurrence,
    RecurrenceMode, Squad, SprintClock, Task, TaskStatus,
};
use crate::services::grading::{GradeRequest, GradingPlan, GradingWorkflow};
use crate::services::outbox::PersistCommand;
use crate::services::progression::{LevelChange, ProgressionEngine};
use crate::services::recurrence::RenewalDecision;
use crate::services::reporting::AggregationReporter;

/// Everything one session works on.
#[derive(Debug, Clone)]
pub struct BoardState {
    pub buildings: Vec<Building>,
    pub squads: Vec<Squad>,
    pub members: Vec<Member>,
    /// The signed-in member
    pub actor: Option<Member>,
    /// The signed-in member's profile, updated optimistically
    pub profile: Option<ProgressionProfile>,
    pub sprint: SprintClock,
}

impl BoardState {
    pub fn new(sprint: SprintClock) -> Self {
        Self {
            buildings: Vec::new(),
            squads: Vec::new(),
            members: Vec::new(),
            actor: None,
            profile: None,
            sprint,
        }
    }

    pub fn building(&self, id: Uuid) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn member(&self, id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn squad(&self, id: Uuid) -> Option<&Squad> {
        self.squads.iter().find(|s| s.id == id)
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.buildings.iter().find_map(|b| b.task(id))
    }

    fn task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.buildings.iter_mut().find_map(|b| b.task_mut(id))
    }

    fn building_index_of_task(&self, id: Uuid) -> Option<usize> {
        self.buildings.iter().position(|b| b.task(id).is_some())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.buildings.iter().flat_map(|b| b.tasks.iter())
    }

    /// Routines currently waiting for a renew/decline decision.
    pub fn pending_renewals(&self) -> Vec<&Task> {
        self.tasks().filter(|t| t.pending_renewal().is_some()).collect()
    }

    fn acting_member(&self) -> DomainResult<&Member> {
        self.actor.as_ref().ok_or(DomainError::NoActiveMember)
    }
}

/// Result of a mutation: its value plus what has to be persisted.
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub commands: Vec<PersistCommand>,
}

impl<T> Mutation<T> {
    pub fn new(value: T, commands: Vec<PersistCommand>) -> Self {
        Self { value, commands }
    }

    pub fn unchanged(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

/// Collaboration rule chosen in the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleChoice {
    Integrated,
    Negotiated,
    Fixed {
        mode: RecurrenceMode,
        quantity_limit: Option<u32>,
        deadline: Option<DateTime<Utc>>,
    },
}

/// Input for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub building_id: Option<Uuid>,
    pub content: String,
    pub description: Option<String>,
    pub size: Option<u32>,
    pub complexity: Option<u8>,
    pub rule: Option<RuleChoice>,
    pub participants: Vec<Uuid>,
    pub squad_id: Option<Uuid>,
}

/// Partial edit of a task; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub content: Option<String>,
    pub description: Option<String>,
    pub size: Option<u32>,
    pub complexity: Option<u8>,
    pub rule: Option<RuleChoice>,
    pub participants: Option<Vec<Uuid>>,
    pub distribution: Option<BTreeMap<Uuid, u64>>,
    pub assignee_id: Option<Uuid>,
    pub evidence_link: Option<String>,
    pub delivery_notes: Option<String>,
    pub reflections: Option<String>,
    pub aim: Option<u8>,
    pub feedback: Option<String>,
}

/// What a successful grading produced.
#[derive(Debug, Clone, Serialize)]
pub struct GradeOutcome {
    pub task: Task,
    pub plan: GradingPlan,
    /// Level change of the signed-in member, when they were rewarded
    pub level_change: Option<LevelChangeView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelChangeView {
    pub from: u32,
    pub to: u32,
}

impl From<LevelChange> for LevelChangeView {
    fn from(change: LevelChange) -> Self {
        Self {
            from: change.from,
            to: change.to,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardService {
    config: Config,
    grading: GradingWorkflow,
    progression: ProgressionEngine,
    reporter: AggregationReporter,
}

impl BoardService {
    pub fn new(config: Config) -> Self {
        let grading = GradingWorkflow::from_config(&config.scoring);
        let progression = ProgressionEngine::new(config.progression.clone());
        let reporter = AggregationReporter::new(grading.capacity().clone(), progression.clone());
        Self {
            config,
            grading,
            progression,
            reporter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grading(&self) -> &GradingWorkflow {
        &self.grading
    }

    pub fn progression(&self) -> &ProgressionEngine {
        &self.progression
    }

    pub fn reporter(&self) -> &AggregationReporter {
        &self.reporter
    }

    pub fn sprint_duration(&self) -> Duration {
        Duration::days(self.config.sprint.duration_days)
    }

    fn rule_from_choice(&self, choice: RuleChoice) -> (CollaborationRule, f64) {
        let rule = match choice {
            RuleChoice::Integrated => CollaborationRule::Integrated,
            RuleChoice::Negotiated => CollaborationRule::Negotiated {
                distribution: BTreeMap::new(),
            },
            RuleChoice::Fixed {
                mode,
                quantity_limit,
                deadline,
            } => CollaborationRule::Fixed(Recurrence {
                mode,
                quantity_limit,
                deadline,
                ..Recurrence::by_quantity(None)
            }),
        };
        let multiplier = self.config.scoring.rule_multipliers.for_kind(rule.kind());
        (rule, multiplier)
    }

    /// Create a task on a project building.
    #[instrument(skip(self, state, input), fields(building_id = ?input.building_id))]
    pub fn create_task(&self, state: &mut BoardState, input: NewTask) -> DomainResult<Mutation<Task>> {
        let actor = state.acting_member()?.clone();

        if input.content.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "Task needs a title/description".to_string(),
            ));
        }
        let building_id = input.building_id.ok_or_else(|| {
            DomainError::ValidationFailed("Select a building for the task".to_string())
        })?;
        let building = state
            .buildings
            .iter_mut()
            .find(|b| b.id == building_id)
            .ok_or(DomainError::BuildingNotFound(building_id))?;
        if !building.kind.accepts_tasks() {
            return Err(DomainError::ValidationFailed(format!(
                "Tasks cannot be created on {} buildings",
                building.kind
            )));
        }

        let mut task = Task::new(input.content.trim(), building_id, actor.id);
        task.description = input.description;
        task.size = input.size.unwrap_or(1);
        task.complexity = input.complexity.unwrap_or(1);
        task.squad_id = input.squad_id.or(building.squad_id).or(actor.squad_id);
        task.set_participants(input.participants);
        let (rule, multiplier) = self.rule_from_choice(input.rule.unwrap_or(RuleChoice::Integrated));
        task.rule = rule;
        task.rule_multiplier = multiplier;
        task.validate().map_err(DomainError::ValidationFailed)?;

        building.tasks.push(task.clone());
        info!(task_id = %task.id, building = %building.name, "task created");

        let command = PersistCommand::SaveTask(Box::new(task.clone()));
        Ok(Mutation::new(task, vec![command]))
    }

    /// Edit task attributes. The edit is validated on a copy first.
    #[instrument(skip(self, state, update))]
    pub fn update_task(
        &self,
        state: &mut BoardState,
        task_id: Uuid,
        update: TaskUpdate,
    ) -> DomainResult<Mutation<Task>> {
        let current = state.task(task_id).ok_or(DomainError::TaskNotFound(task_id))?;
        let mut task = current.clone();

        if let Some(content) = update.content {
            task.content = content.trim().to_string();
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(size) = update.size {
            task.size = size;
        }
        if let Some(complexity) = update.complexity {
            task.complexity = complexity;
        }
        if let Some(choice) = update.rule {
            if task.pending_renewal().is_some() {
                return Err(GradingError::RenewalPending(task_id).into());
            }
            match (task.rule.recurrence_mut(), choice) {
                // editing a routine keeps its cycle counter
                (
                    Some(recurrence),
                    RuleChoice::Fixed {
                        mode,
                        quantity_limit,
                        deadline,
                    },
                ) => {
                    recurrence.mode = mode;
                    recurrence.quantity_limit = quantity_limit;
                    recurrence.deadline = deadline;
                }
                (_, choice) => {
                    let (rule, multiplier) = self.rule_from_choice(choice);
                    if rule.kind() != task.rule_kind() {
                        task.rule = rule;
                        task.rule_multiplier = multiplier;
                    }
                }
            }
        }
        if let Some(participants) = update.participants {
            task.set_participants(participants);
        }
        if let Some(shares) = update.distribution {
            match &mut task.rule {
                CollaborationRule::Negotiated { distribution } => *distribution = shares,
                _ => {
                    return Err(DomainError::ValidationFailed(
                        "Point shares only apply to negotiated tasks".to_string(),
                    ))
                }
            }
        }
        if let Some(assignee) = update.assignee_id {
            task.assignee_id = Some(assignee);
        }
        if let Some(link) = update.evidence_link {
            task.evidence_link = Some(link);
        }
        if let Some(notes) = update.delivery_notes {
            task.delivery_notes = Some(notes);
        }
        if let Some(reflections) = update.reflections {
            task.reflections = Some(reflections);
        }
        if let Some(aim) = update.aim {
            if self.grading.aim_scale().get(aim).is_none() {
                return Err(GradingError::UnknownRating(aim).into());
            }
            task.aim = Some(aim);
        }
        if let Some(feedback) = update.feedback {
            task.feedback = Some(feedback);
        }

        task.validate().map_err(DomainError::ValidationFailed)?;
        task.touch();

        let slot = state.task_mut(task_id).ok_or(DomainError::TaskNotFound(task_id))?;
        *slot = task.clone();
        debug!(task_id = %task_id, version = task.version, "task updated");

        let command = PersistCommand::SaveTask(Box::new(task.clone()));
        Ok(Mutation::new(task, vec![command]))
    }

    /// Move a task to another lane. Moving to the current lane is a no-op.
    #[instrument(skip(self, state))]
    pub fn move_task(
        &self,
        state: &mut BoardState,
        task_id: Uuid,
        to: TaskStatus,
    ) -> DomainResult<Mutation<Task>> {
        let cycle = state.sprint.cycle;
        let task = state.task_mut(task_id).ok_or(DomainError::TaskNotFound(task_id))?;
        let from = task.status;

        if from == to {
            return Ok(Mutation::unchanged(task.clone()));
        }
        if task.pending_renewal().is_some() {
            return Err(GradingError::RenewalPending(task_id).into());
        }
        if task.rule.recurrence().is_some_and(|r| r.closed) {
            return Err(GradingError::RoutineClosed(task_id).into());
        }
        if from == TaskStatus::Done {
            return Err(DomainError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason: "completed tasks stay done".to_string(),
            });
        }
        if to == TaskStatus::Done {
            return Err(DomainError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason: "tasks are completed by grading".to_string(),
            });
        }

        if from == TaskStatus::Backlog {
            task.sprint_history.insert(cycle);
        }
        task.status = to;
        task.touch();
        info!(task_id = %task_id, %from, %to, "task moved");

        let snapshot = task.clone();
        let command = PersistCommand::SaveTask(Box::new(snapshot.clone()));
        Ok(Mutation::new(snapshot, vec![command]))
    }

    pub fn delete_task(&self, state: &mut BoardState, task_id: Uuid) -> DomainResult<Mutation<Task>> {
        let index = state
            .building_index_of_task(task_id)
            .ok_or(DomainError::TaskNotFound(task_id))?;
        let building = &mut state.buildings[index];
        let position = building
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(DomainError::TaskNotFound(task_id))?;
        let task = building.tasks.remove(position);
        info!(task_id = %task_id, "task deleted");
        Ok(Mutation::new(task, vec![PersistCommand::DeleteTask(task_id)]))
    }

    /// Grade a task in review as the signed-in member.
    #[instrument(skip(self, state, request))]
    pub fn grade_task(
        &self,
        state: &mut BoardState,
        task_id: Uuid,
        request: GradeRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<Mutation<GradeOutcome>> {
        let actor = state.acting_member()?.clone();
        let index = state
            .building_index_of_task(task_id)
            .ok_or(DomainError::TaskNotFound(task_id))?;
        let pending_elsewhere = state
            .pending_renewals()
            .into_iter()
            .map(|t| t.id)
            .find(|id| *id != task_id);

        let plan = self.grading.plan(
            &actor,
            &state.buildings[index],
            task_id,
            &request,
            state.sprint.cycle,
            pending_elsewhere,
            now,
        )?;

        let building = &mut state.buildings[index];
        let task = building.task_mut(task_id).ok_or(DomainError::TaskNotFound(task_id))?;
        let batch = self.grading.apply(&plan, task);
        let task = task.clone();

        let mut level_change = None;
        if let (Some(award), Some(profile)) = (plan.award_for(actor.id), state.profile.as_mut()) {
            let change = self.progression.apply_reward(
                profile,
                award.points,
                award.xp,
                award.coins,
                plan.stars,
            );
            if change.leveled_up() {
                info!(member_id = %actor.id, from = change.from, to = change.to, "level up");
            }
            level_change = Some(change.into());
        }

        let commands = vec![
            PersistCommand::SaveTask(Box::new(task.clone())),
            PersistCommand::ApplyRewards(batch),
        ];
        Ok(Mutation::new(
            GradeOutcome {
                task,
                plan,
                level_change,
            },
            commands,
        ))
    }

    /// Renew or close a routine waiting for a decision.
    #[instrument(skip(self, state))]
    pub fn resolve_renewal(
        &self,
        state: &mut BoardState,
        task_id: Uuid,
        decision: RenewalDecision,
    ) -> DomainResult<Mutation<Task>> {
        let role = state.acting_member()?.role;
        if !role.can_grade() {
            return Err(GradingError::Unauthorized(role).into());
        }
        let task = state.task_mut(task_id).ok_or(DomainError::TaskNotFound(task_id))?;
        self.grading.recurrence().resolve(task, decision)?;
        task.touch();

        let snapshot = task.clone();
        let command = PersistCommand::SaveTask(Box::new(snapshot.clone()));
        Ok(Mutation::new(snapshot, vec![command]))
    }

    /// Advance the sprint clock by every fully elapsed sprint.
    pub fn advance_sprint(&self, state: &mut BoardState, now: DateTime<Utc>) -> Mutation<u32> {
        let advanced = state.sprint.advance(now, self.sprint_duration());
        if advanced == 0 {
            return Mutation::unchanged(0);
        }
        info!(cycle = state.sprint.cycle, advanced, "sprint advanced");
        Mutation::new(advanced, vec![PersistCommand::SaveSprint(state.sprint)])
    }

    /// Tasks of a member across every non-residential building.
    pub fn member_tasks<'a>(&self, state: &'a BoardState, member_id: Uuid) -> Vec<&'a Task> {
        state
            .buildings
            .iter()
            .filter(|b| b.kind != BuildingKind::Residential)
            .flat_map(|b| b.tasks.iter())
            .filter(|t| t.involves(member_id))
            .collect()
    }

    pub fn squad_tasks<'a>(&self, state: &'a BoardState, squad_id: Uuid) -> Vec<&'a Task> {
        state
            .buildings
            .iter()
            .flat_map(|b| {
                b.tasks.iter().filter(move |t| {
                    t.squad_id == Some(squad_id)
                        || (t.squad_id.is_none() && b.squad_id == Some(squad_id))
                })
            })
            .collect()
    }
}
