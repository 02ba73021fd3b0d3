//! Cycling of FIXED (routine) tasks and renewal decisions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::errors::GradingError;
use crate::domain::models::{CollaborationRule, RenewalTrigger, Task, TaskStatus};

/// Where a task goes after a successful grading cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// One-off task, closed for good
    Completed,
    /// Routine below its limit, back to the backlog
    Recycled { cycle_count: u32 },
    /// Routine hit its limit and waits for a renew/decline decision
    RenewalRequired {
        cycle_count: u32,
        trigger: RenewalTrigger,
    },
}

/// Answer to a renewal prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalDecision {
    Renew,
    Decline,
}

#[derive(Debug, Clone)]
pub struct RecurrenceManager {
    extension: Duration,
}

impl Default for RecurrenceManager {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

impl RecurrenceManager {
    pub fn new(extension: Duration) -> Self {
        Self { extension }
    }

    /// Decide the outcome of grading `task` once more at `now` without touching it.
    pub fn next_cycle(&self, task: &Task, now: DateTime<Utc>) -> Result<CycleOutcome, GradingError> {
        let Some(recurrence) = task.rule.recurrence() else {
            return Ok(CycleOutcome::Completed);
        };
        if recurrence.closed {
            return Err(GradingError::RoutineClosed(task.id));
        }
        if recurrence.pending_renewal.is_some() {
            return Err(GradingError::RenewalPending(task.id));
        }

        let cycle_count = recurrence.cycle_count.saturating_add(1);
        let deadline_reached = recurrence.deadline.is_some_and(|deadline| now >= deadline);
        let quantity_reached = recurrence
            .quantity_limit
            .is_some_and(|limit| cycle_count >= limit);

        let trigger = if deadline_reached {
            Some(RenewalTrigger::Deadline)
        } else if quantity_reached {
            Some(RenewalTrigger::Quantity)
        } else {
            None
        };

        Ok(match trigger {
            Some(trigger) => CycleOutcome::RenewalRequired {
                cycle_count,
                trigger,
            },
            None => CycleOutcome::Recycled { cycle_count },
        })
    }

    /// Move the task into the state `outcome` describes.
    pub fn apply(&self, task: &mut Task, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Completed => {
                task.status = TaskStatus::Done;
            }
            CycleOutcome::Recycled { cycle_count } => {
                if let Some(recurrence) = task.rule.recurrence_mut() {
                    recurrence.cycle_count = cycle_count;
                }
                task.status = TaskStatus::Backlog;
                task.clear_cycle_fields();
                debug!(task_id = %task.id, cycle_count, "routine returned to backlog");
            }
            CycleOutcome::RenewalRequired {
                cycle_count,
                trigger,
            } => {
                if let Some(recurrence) = task.rule.recurrence_mut() {
                    recurrence.cycle_count = cycle_count;
                    recurrence.pending_renewal = Some(trigger);
                }
                task.status = TaskStatus::Done;
                info!(
                    task_id = %task.id,
                    cycle_count,
                    trigger = trigger.as_str(),
                    "routine limit reached, renewal decision required"
                );
            }
        }
    }

    /// Resolve a pending renewal prompt.
    pub fn resolve(&self, task: &mut Task, decision: RenewalDecision) -> Result<(), GradingError> {
        let task_id = task.id;
        let extension = self.extension;
        let CollaborationRule::Fixed(recurrence) = &mut task.rule else {
            return Err(GradingError::NoRenewalPending(task_id));
        };
        let Some(trigger) = recurrence.pending_renewal.take() else {
            return Err(GradingError::NoRenewalPending(task_id));
        };

        match decision {
            RenewalDecision::Renew => {
                recurrence.cycle_count = 0;
                if trigger == RenewalTrigger::Deadline {
                    recurrence.deadline = recurrence.deadline.map(|d| d + extension);
                }
                task.status = TaskStatus::Backlog;
                task.clear_cycle_fields();
            }
            RenewalDecision::Decline => {
                recurrence.closed = true;
                task.status = TaskStatus::Done;
            }
        }

        info!(task_id = %task_id, ?decision, trigger = trigger.as_str(), "renewal resolved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::models::Recurrence;

    fn routine(recurrence: Recurrence) -> Task {
        let mut task = Task::new("Weekly report", Uuid::new_v4(), Uuid::new_v4())
            .with_rule(CollaborationRule::Fixed(recurrence), 1.0)
            .with_status(TaskStatus::Review);
        task.aim = Some(2);
        task.final_pa = Some(4);
        task.feedback = Some("solid".into());
        task
    }

    #[test]
    fn test_one_off_task_completes() {
        let task = Task::new("One-off", Uuid::new_v4(), Uuid::new_v4());
        let manager = RecurrenceManager::default();
        assert_eq!(manager.next_cycle(&task, Utc::now()), Ok(CycleOutcome::Completed));
    }

    #[test]
    fn test_below_limit_returns_to_backlog() {
        let manager = RecurrenceManager::default();
        let mut task = routine(Recurrence::by_quantity(Some(3)));

        let outcome = manager.next_cycle(&task, Utc::now()).unwrap();
        assert_eq!(outcome, CycleOutcome::Recycled { cycle_count: 1 });

        manager.apply(&mut task, outcome);
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(task.aim.is_none());
        assert!(task.final_pa.is_none());
        assert_eq!(task.rule.recurrence().unwrap().cycle_count, 1);
    }

    #[test]
    fn test_reaching_quantity_limit_requires_renewal() {
        let manager = RecurrenceManager::default();
        let mut recurrence = Recurrence::by_quantity(Some(3));
        recurrence.cycle_count = 2;
        let mut task = routine(recurrence);

        let outcome = manager.next_cycle(&task, Utc::now()).unwrap();
        manager.apply(&mut task, outcome);

        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.pending_renewal(), Some(RenewalTrigger::Quantity));
        assert_eq!(task.final_pa, Some(4));
    }

    #[test]
    fn test_deadline_takes_precedence() {
        let manager = RecurrenceManager::default();
        let now = Utc::now();
        let mut recurrence = Recurrence::by_quantity(Some(1));
        recurrence.deadline = Some(now - Duration::hours(1));
        let task = routine(recurrence);

        assert_eq!(
            manager.next_cycle(&task, now),
            Ok(CycleOutcome::RenewalRequired {
                cycle_count: 1,
                trigger: RenewalTrigger::Deadline
            })
        );
    }

    #[test]
    fn test_renew_resets_counter_and_extends_deadline() {
        let manager = RecurrenceManager::default();
        let deadline = Utc::now() - Duration::hours(2);
        let mut task = routine(Recurrence::by_deadline(Some(deadline)));
        let outcome = manager.next_cycle(&task, Utc::now()).unwrap();
        manager.apply(&mut task, outcome);

        manager.resolve(&mut task, RenewalDecision::Renew).unwrap();

        let recurrence = task.rule.recurrence().unwrap();
        assert_eq!(recurrence.cycle_count, 0);
        assert_eq!(recurrence.deadline, Some(deadline + Duration::days(7)));
        assert!(recurrence.pending_renewal.is_none());
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(task.final_pa.is_none());
    }

    #[test]
    fn test_decline_closes_routine() {
        let manager = RecurrenceManager::default();
        let mut recurrence = Recurrence::by_quantity(Some(1));
        recurrence.pending_renewal = Some(RenewalTrigger::Quantity);
        let mut task = routine(recurrence);

        manager.resolve(&mut task, RenewalDecision::Decline).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(
            manager.next_cycle(&task, Utc::now()),
            Err(GradingError::RoutineClosed(task.id))
        );
    }

    #[test]
    fn test_resolve_without_pending_is_an_error() {
        let manager = RecurrenceManager::default();
        let mut task = routine(Recurrence::by_quantity(Some(5)));
        assert_eq!(
            manager.resolve(&mut task, RenewalDecision::Renew),
            Err(GradingError::NoRenewalPending(task.id))
        );
    }
}
