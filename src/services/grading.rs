//! Grading: turning a reviewed task into rewards.
//!
//! Grading is split in two steps. [`GradingWorkflow::plan`] validates the
//! request and computes every number without touching the task, so any
//! rejection leaves state untouched. [`GradingWorkflow::apply`] then writes
//! the plan onto the task and yields the reward batch to persist.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, GradingError};
use crate::domain::models::{
    Building, HistoryEntry, Member, ParticipantAward, RewardBatch, ScoringConfig, Task, TaskStatus,
};
use crate::services::capacity::CapacityGuard;
use crate::services::distribution::participant_shares;
use crate::services::recurrence::{CycleOutcome, RecurrenceManager};
use crate::services::scoring::{base_points, floor_points, AimScale, RewardFactors};

/// Grader input.
#[derive(Debug, Clone, Default)]
pub struct GradeRequest {
    /// Omitted ratings fall back to the neutral value
    pub aim: Option<u8>,
    pub feedback: Option<String>,
}

/// Everything a grading cycle will change, computed up front.
#[derive(Debug, Clone, Serialize)]
pub struct GradingPlan {
    pub task_id: Uuid,
    pub base_points: u64,
    pub aim: u8,
    pub stars: u8,
    pub multiplier: f64,
    pub final_pa: u64,
    pub final_xp: u64,
    pub final_coins: u64,
    /// Positive awards only
    pub awards: Vec<ParticipantAward>,
    /// Building total after this cycle
    pub capacity_total: u64,
    pub outcome: CycleOutcome,
    pub feedback: Option<String>,
    pub sprint: u32,
    pub graded_at: DateTime<Utc>,
}

impl GradingPlan {
    pub fn award_for(&self, member_id: Uuid) -> Option<&ParticipantAward> {
        self.awards.iter().find(|a| a.participant_id == member_id)
    }
}

#[derive(Debug, Clone)]
pub struct GradingWorkflow {
    aim_scale: AimScale,
    factors: RewardFactors,
    capacity: CapacityGuard,
    recurrence: RecurrenceManager,
}

impl GradingWorkflow {
    pub fn new(
        aim_scale: AimScale,
        factors: RewardFactors,
        capacity: CapacityGuard,
        recurrence: RecurrenceManager,
    ) -> Self {
        Self {
            aim_scale,
            factors,
            capacity,
            recurrence,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(
            AimScale::from_config(config),
            RewardFactors::from_config(config),
            CapacityGuard::new(config.capacity.clone()),
            RecurrenceManager::new(chrono::Duration::days(config.renewal_extension_days)),
        )
    }

    pub fn aim_scale(&self) -> &AimScale {
        &self.aim_scale
    }

    pub fn capacity(&self) -> &CapacityGuard {
        &self.capacity
    }

    pub fn recurrence(&self) -> &RecurrenceManager {
        &self.recurrence
    }

    /// Validate a grading request and compute its effects.
    ///
    /// `pending_elsewhere` names another task on the board that already
    /// waits for a renewal decision; a cycle that would raise a second
    /// prompt is refused.
    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        &self,
        actor: &Member,
        building: &Building,
        task_id: Uuid,
        request: &GradeRequest,
        sprint: u32,
        pending_elsewhere: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> DomainResult<GradingPlan> {
        let task = building.task(task_id).ok_or(DomainError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::Review {
            return Err(GradingError::NotInReview(task.status).into());
        }
        if !actor.role.can_grade() {
            return Err(GradingError::Unauthorized(actor.role).into());
        }

        let base = base_points(task);
        let shares = participant_shares(task, base)?;
        let capacity_total = self.capacity.ensure(building, base)?;

        let aim = self.aim_scale.resolve(request.aim.or(task.aim))?;
        let multiplier = aim.multiplier;

        #[allow(clippy::cast_precision_loss)]
        let awards: Vec<ParticipantAward> = shares
            .iter()
            .map(|share| {
                let points = floor_points(share.points as f64, multiplier);
                ParticipantAward {
                    participant_id: share.participant_id,
                    points,
                    xp: self.factors.xp(points),
                    coins: self.factors.coins(points),
                }
            })
            .filter(|award| award.points > 0)
            .collect();

        if awards.is_empty() {
            return Err(GradingError::NothingToDistribute.into());
        }

        let outcome = self.recurrence.next_cycle(task, now)?;
        if let (CycleOutcome::RenewalRequired { .. }, Some(other)) = (outcome, pending_elsewhere) {
            if other != task.id {
                return Err(GradingError::RenewalPending(other).into());
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let final_pa = floor_points(base as f64, multiplier);

        debug!(
            task_id = %task.id,
            base,
            aim = aim.value,
            final_pa,
            participants = task.participants.len(),
            rewarded = awards.len(),
            "grading plan computed"
        );

        Ok(GradingPlan {
            task_id: task.id,
            base_points: base,
            aim: aim.value,
            stars: aim.stars,
            multiplier,
            final_pa,
            final_xp: self.factors.xp(final_pa),
            final_coins: self.factors.coins(final_pa),
            awards,
            capacity_total,
            outcome,
            feedback: request.feedback.clone().or_else(|| task.feedback.clone()),
            sprint,
            graded_at: now,
        })
    }

    /// Write a plan onto its task and return the reward batch for persistence.
    pub fn apply(&self, plan: &GradingPlan, task: &mut Task) -> RewardBatch {
        task.aim = Some(plan.aim);
        task.feedback = plan.feedback.clone();
        task.final_pa = Some(plan.final_pa);
        task.final_xp = Some(plan.final_xp);
        task.final_coins = Some(plan.final_coins);
        task.history.push(HistoryEntry {
            timestamp: plan.graded_at,
            aim: plan.aim,
            points: plan.final_pa,
            xp: plan.final_xp,
            coins: plan.final_coins,
            participants: task.participants.clone(),
            awards: plan.awards.clone(),
            feedback: plan.feedback.clone(),
            sprint: plan.sprint,
        });
        task.sprint_history.insert(plan.sprint);

        let cycle = u32::try_from(task.history.len()).unwrap_or(u32::MAX);
        self.recurrence.apply(task, plan.outcome);
        task.touch();

        info!(
            task_id = %task.id,
            cycle,
            final_pa = plan.final_pa,
            status = %task.status,
            "task graded"
        );

        RewardBatch::new(task.id, cycle, plan.aim, plan.stars, plan.awards.clone())
    }
}

impl Default for GradingWorkflow {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::models::{BuildingKind, CollaborationRule, Recurrence, Role};

    struct Fixture {
        grader: Member,
        worker: Member,
        building: Building,
    }

    fn fixture() -> Fixture {
        let grader = Member::new("Ada", Role::Master);
        let worker = Member::new("Lin", Role::Executor);
        let building = Building::new("Platform", BuildingKind::Project, grader.id);
        Fixture {
            grader,
            worker,
            building,
        }
    }

    fn add_task(fx: &mut Fixture, task: Task) -> Uuid {
        let id = task.id;
        fx.building.tasks.push(task);
        id
    }

    fn review_task(fx: &Fixture) -> Task {
        Task::new("Migrate CI", fx.building.id, fx.worker.id)
            .with_size(5)
            .with_complexity(2)
            .with_status(TaskStatus::Review)
    }

    #[test]
    fn test_plan_and_apply_integrated_task() {
        let mut fx = fixture();
        let task = review_task(&fx);
        let id = add_task(&mut fx, task);
        let workflow = GradingWorkflow::default();

        let plan = workflow
            .plan(&fx.grader, &fx.building, id, &GradeRequest::default(), 1, None, Utc::now())
            .unwrap();
        assert_eq!(plan.base_points, 10);
        assert_eq!(plan.final_pa, 10);
        assert_eq!(plan.final_xp, 100);
        assert_eq!(plan.awards.len(), 1);
        assert_eq!(plan.outcome, CycleOutcome::Completed);

        let task = fx.building.task_mut(id).unwrap();
        let batch = workflow.apply(&plan, task);
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.history.len(), 1);
        assert_eq!(batch.cycle, 1);
        assert_eq!(batch.awards[0].participant_id, fx.worker.id);
    }

    #[test]
    fn test_executor_cannot_grade() {
        let mut fx = fixture();
        let task = review_task(&fx);
        let id = add_task(&mut fx, task);
        let err = GradingWorkflow::default()
            .plan(&fx.worker, &fx.building, id, &GradeRequest::default(), 1, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Grading(GradingError::Unauthorized(Role::Executor))));
    }

    #[test]
    fn test_task_outside_review_is_rejected() {
        let mut fx = fixture();
        let task = review_task(&fx).with_status(TaskStatus::Doing);
        let id = add_task(&mut fx, task);
        let err = GradingWorkflow::default()
            .plan(&fx.grader, &fx.building, id, &GradeRequest::default(), 1, None, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Grading(GradingError::NotInReview(TaskStatus::Doing))
        ));
    }

    #[test]
    fn test_rating_scales_participant_awards() {
        let mut fx = fixture();
        let task = review_task(&fx);
        let id = add_task(&mut fx, task);
        let request = GradeRequest {
            aim: Some(3),
            feedback: Some("excellent".into()),
        };
        let plan = GradingWorkflow::default()
            .plan(&fx.grader, &fx.building, id, &request, 2, None, Utc::now())
            .unwrap();
        assert_eq!(plan.final_pa, 15);
        assert_eq!(plan.awards[0].points, 15);
        assert_eq!(plan.awards[0].coins, 15);
        assert_eq!(plan.stars, 5);
    }

    #[test]
    fn test_zero_share_participants_are_not_rewarded() {
        let mut fx = fixture();
        let mut distribution = BTreeMap::new();
        distribution.insert(fx.worker.id, 10);
        distribution.insert(fx.grader.id, 0);
        let task = review_task(&fx)
            .with_rule(CollaborationRule::Negotiated { distribution }, 1.0)
            .with_participants([fx.worker.id, fx.grader.id]);
        let id = add_task(&mut fx, task);

        let plan = GradingWorkflow::default()
            .plan(&fx.grader, &fx.building, id, &GradeRequest::default(), 1, None, Utc::now())
            .unwrap();
        assert_eq!(plan.awards.len(), 1);
        assert!(plan.award_for(fx.grader.id).is_none());
    }

    #[test]
    fn test_nothing_to_distribute() {
        let mut fx = fixture();
        let task = review_task(&fx).with_size(1).with_complexity(1);
        let id = add_task(&mut fx, task);
        let request = GradeRequest {
            aim: Some(0),
            feedback: None,
        };
        // floor(1 × 0.5) = 0
        let err = GradingWorkflow::default()
            .plan(&fx.grader, &fx.building, id, &request, 1, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Grading(GradingError::NothingToDistribute)));
    }

    #[test]
    fn test_second_renewal_prompt_is_refused() {
        let mut fx = fixture();
        let other = Uuid::new_v4();
        let task = review_task(&fx).with_rule(
            CollaborationRule::Fixed(Recurrence::by_quantity(Some(1))),
            1.0,
        );
        let id = add_task(&mut fx, task);

        let err = GradingWorkflow::default()
            .plan(&fx.grader, &fx.building, id, &GradeRequest::default(), 1, Some(other), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Grading(GradingError::RenewalPending(o)) if o == other));
    }
}
