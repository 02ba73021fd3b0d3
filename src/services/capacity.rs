//! Building capacity ceilings.

use crate::domain::errors::GradingError;
use crate::domain::models::{Building, CapacityConfig, Task, TaskStatus};

/// Outcome of a capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityDecision {
    /// Accepted; `total` is the accumulated amount after the candidate lands
    Allow { total: u64 },
    Reject { current: u64, candidate: u64, limit: u64 },
}

#[derive(Debug, Clone)]
pub struct CapacityGuard {
    config: CapacityConfig,
}

impl CapacityGuard {
    pub fn new(config: CapacityConfig) -> Self {
        Self { config }
    }

    pub fn ceiling(&self, building: &Building) -> u64 {
        self.config.ceiling_for(building.level)
    }

    /// Completed points already absorbed by the building.
    pub fn accumulated(&self, building: &Building) -> u64 {
        building.tasks.iter().map(completed_points).fold(0, u64::saturating_add)
    }

    pub fn check(&self, building: &Building, candidate: u64) -> CapacityDecision {
        let current = self.accumulated(building);
        let limit = self.ceiling(building);
        let total = current.saturating_add(candidate);
        if total > limit {
            CapacityDecision::Reject {
                current,
                candidate,
                limit,
            }
        } else {
            CapacityDecision::Allow { total }
        }
    }

    pub fn ensure(&self, building: &Building, candidate: u64) -> Result<u64, GradingError> {
        match self.check(building, candidate) {
            CapacityDecision::Allow { total } => Ok(total),
            CapacityDecision::Reject {
                current,
                candidate,
                limit,
            } => Err(GradingError::CapacityExceeded {
                current,
                candidate,
                limit,
            }),
        }
    }
}

impl Default for CapacityGuard {
    fn default() -> Self {
        Self::new(CapacityConfig::default())
    }
}

/// Points a task contributes to its building: the final PA of a done task
/// plus the points of every graded cycle in its history.
pub fn completed_points(task: &Task) -> u64 {
    let current = match (task.status, task.final_pa) {
        (TaskStatus::Done, Some(points)) => points,
        _ => 0,
    };
    task.history
        .iter()
        .map(|h| h.points)
        .fold(current, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::models::{BuildingKind, HistoryEntry};

    fn building_with_done(points: u64) -> Building {
        let owner = Uuid::new_v4();
        let mut building = Building::new("Ops", BuildingKind::Project, owner);
        let mut task = Task::new("Legacy", building.id, owner).with_status(TaskStatus::Done);
        task.final_pa = Some(points);
        building.tasks.push(task);
        building
    }

    #[test]
    fn test_rejects_when_ceiling_would_be_exceeded() {
        let guard = CapacityGuard::default();
        let building = building_with_done(95);
        assert_eq!(
            guard.check(&building, 10),
            CapacityDecision::Reject {
                current: 95,
                candidate: 10,
                limit: 100
            }
        );
    }

    #[test]
    fn test_allows_reaching_ceiling_exactly() {
        let guard = CapacityGuard::default();
        let building = building_with_done(90);
        assert_eq!(guard.ensure(&building, 10), Ok(100));
    }

    fn cycle(owner: Uuid, points: u64, sprint: u32) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc::now(),
            aim: 1,
            points,
            xp: points * 10,
            coins: points,
            participants: vec![owner],
            awards: Vec::new(),
            feedback: None,
            sprint,
        }
    }

    #[test]
    fn test_done_task_counts_final_pa_and_history() {
        let owner = Uuid::new_v4();
        let mut task = Task::new("Graded", Uuid::new_v4(), owner).with_status(TaskStatus::Done);
        task.final_pa = Some(10);
        task.history.push(cycle(owner, 10, 1));
        assert_eq!(completed_points(&task), 20);
    }

    #[test]
    fn test_graded_task_and_candidate_over_ceiling_is_rejected() {
        let owner = Uuid::new_v4();
        let mut building = Building::new("Ops", BuildingKind::Project, owner);
        let mut task = Task::new("Graded", building.id, owner).with_status(TaskStatus::Done);
        task.final_pa = Some(10);
        task.history.push(cycle(owner, 10, 1));
        building.tasks.push(task);

        let guard = CapacityGuard::default();
        assert_eq!(guard.accumulated(&building), 20);
        assert_eq!(
            guard.check(&building, 85),
            CapacityDecision::Reject {
                current: 20,
                candidate: 85,
                limit: 100
            }
        );
        assert_eq!(guard.ensure(&building, 80), Ok(100));
    }

    #[test]
    fn test_recycled_routine_counts_history_only() {
        let owner = Uuid::new_v4();
        let mut task = Task::new("Routine", Uuid::new_v4(), owner);
        task.history.extend([cycle(owner, 4, 1), cycle(owner, 6, 2), cycle(owner, 5, 2)]);
        assert_eq!(task.status, TaskStatus::Backlog);
        assert_eq!(completed_points(&task), 15);
    }

    #[test]
    fn test_unconfigured_level_uses_fallback() {
        let guard = CapacityGuard::default();
        let building = building_with_done(0).with_level(77);
        assert_eq!(guard.ceiling(&building), 99_999);
    }
}
