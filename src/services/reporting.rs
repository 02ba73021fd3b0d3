//! Read-only dashboards over boards and graded history.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{Building, Member, Squad, Task, TaskStatus, TeamProgression};
use crate::services::capacity::CapacityGuard;
use crate::services::progression::{GuildProgress, ProgressionEngine};
use crate::services::scoring::task_points;

/// Time window for aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "period", content = "sprint", rename_all = "snake_case")]
pub enum PeriodFilter {
    #[default]
    All,
    Sprint(u32),
}

impl PeriodFilter {
    /// Records without a sprint (imported results) only count for `All`.
    pub fn includes(&self, sprint: Option<u32>) -> bool {
        match self {
            Self::All => true,
            Self::Sprint(n) => sprint == Some(*n),
        }
    }

    /// Whether a task tagged with `sprints` belongs to the period.
    pub fn includes_any(&self, sprints: &BTreeSet<u32>) -> bool {
        match self {
            Self::All => true,
            Self::Sprint(n) => sprints.contains(n),
        }
    }
}

/// One completed contribution of a task.
#[derive(Debug, Clone, PartialEq)]
struct Contribution {
    points: u64,
    xp: u64,
    aim: Option<u8>,
    sprint: Option<u32>,
    complexity: u8,
    /// (member, points) pairs
    awards: Vec<(Uuid, u64)>,
}

fn contributions(task: &Task) -> Vec<Contribution> {
    if task.history.is_empty() {
        return match (task.status, task.final_pa) {
            (TaskStatus::Done, Some(points)) => vec![Contribution {
                points,
                xp: task.final_xp.unwrap_or(0),
                aim: task.aim,
                sprint: None,
                complexity: task.complexity,
                awards: task.participants.iter().map(|p| (*p, points)).collect(),
            }],
            _ => Vec::new(),
        };
    }

    task.history
        .iter()
        .map(|entry| Contribution {
            points: entry.points,
            xp: entry.xp,
            aim: Some(entry.aim),
            sprint: Some(entry.sprint),
            complexity: task.complexity,
            awards: entry
                .awards
                .iter()
                .map(|a| (a.participant_id, a.points))
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingStats {
    pub building_id: Uuid,
    pub name: String,
    pub task_count: usize,
    pub done_count: usize,
    /// Points of unfinished tasks
    pub planned_pa: u64,
    /// Points absorbed by graded cycles
    pub concluded_pa: u64,
    pub ceiling: u64,
    pub percent_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquadStats {
    pub squad_id: Uuid,
    pub name: String,
    pub planned_pa: u64,
    pub completed_pa: u64,
    pub cycles: usize,
    pub team: TeamProgression,
    /// Average rating over rated cycles; `None` when nothing was rated
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: Uuid,
    pub name: String,
    pub total_points: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintBucket {
    pub sprint: u32,
    pub points: u64,
    pub cycles: usize,
    pub complexity_avg: f64,
    pub aim_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub task_count: usize,
    pub done_count: usize,
    pub planned_pa: u64,
    pub completed_pa: u64,
    pub average_rating: Option<f64>,
    pub guild: GuildProgress,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationReporter {
    capacity: CapacityGuard,
    progression: ProgressionEngine,
}

impl AggregationReporter {
    pub fn new(capacity: CapacityGuard, progression: ProgressionEngine) -> Self {
        Self {
            capacity,
            progression,
        }
    }

    pub fn building_stats(&self, building: &Building) -> BuildingStats {
        let ceiling = self.capacity.ceiling(building);
        let concluded_pa = self.capacity.accumulated(building);
        #[allow(clippy::cast_precision_loss)]
        let percent_used = if ceiling == 0 {
            0.0
        } else {
            concluded_pa as f64 / ceiling as f64 * 100.0
        };

        BuildingStats {
            building_id: building.id,
            name: building.name.clone(),
            task_count: building.tasks.len(),
            done_count: building.tasks.iter().filter(|t| t.status.is_terminal()).count(),
            planned_pa: planned_points(building.tasks.iter()),
            concluded_pa,
            ceiling,
            percent_used,
        }
    }

    pub fn squad_stats(
        &self,
        squad: &Squad,
        buildings: &[Building],
        period: PeriodFilter,
    ) -> SquadStats {
        let tasks: Vec<&Task> = squad_tasks(squad.id, buildings).collect();
        let cycles: Vec<Contribution> = tasks
            .iter()
            .flat_map(|t| contributions(t))
            .filter(|c| period.includes(c.sprint))
            .collect();

        let completed_pa = total(cycles.iter().map(|c| c.points));
        let total_xp = total(cycles.iter().map(|c| c.xp));

        SquadStats {
            squad_id: squad.id,
            name: squad.name.clone(),
            planned_pa: planned_points(
                tasks
                    .iter()
                    .copied()
                    .filter(|t| period.includes_any(&t.sprint_history)),
            ),
            completed_pa,
            cycles: cycles.len(),
            team: self.progression.team_progression(total_xp),
            average_rating: average_rating(&cycles),
        }
    }

    /// Squads ordered by completed points, ties keep input order.
    pub fn squad_leaderboard(
        &self,
        squads: &[Squad],
        buildings: &[Building],
        period: PeriodFilter,
    ) -> Vec<LeaderboardEntry> {
        let totals = squads
            .iter()
            .map(|squad| {
                let points = total(
                    squad_tasks(squad.id, buildings)
                        .flat_map(contributions)
                        .filter(|c| period.includes(c.sprint))
                        .map(|c| c.points),
                );
                (squad.id, squad.name.clone(), points)
            })
            .collect();
        rank(totals)
    }

    /// Members ordered by awarded points, ties keep input order.
    pub fn member_leaderboard(
        &self,
        members: &[Member],
        buildings: &[Building],
        period: PeriodFilter,
    ) -> Vec<LeaderboardEntry> {
        let mut earned: BTreeMap<Uuid, u64> = BTreeMap::new();
        for contribution in all_tasks(buildings)
            .flat_map(contributions)
            .filter(|c| period.includes(c.sprint))
        {
            for (member, points) in contribution.awards {
                let entry = earned.entry(member).or_default();
                *entry = entry.saturating_add(points);
            }
        }

        let totals = members
            .iter()
            .map(|m| (m.id, m.name.clone(), earned.get(&m.id).copied().unwrap_or(0)))
            .collect();
        rank(totals)
    }

    /// Per-sprint buckets in ascending sprint order.
    pub fn sprint_series(&self, buildings: &[Building]) -> Vec<SprintBucket> {
        let mut buckets: BTreeMap<u32, Vec<Contribution>> = BTreeMap::new();
        for contribution in all_tasks(buildings).flat_map(contributions) {
            if let Some(sprint) = contribution.sprint {
                buckets.entry(sprint).or_default().push(contribution);
            }
        }

        buckets
            .into_iter()
            .map(|(sprint, cycles)| {
                #[allow(clippy::cast_precision_loss)]
                let complexity_avg = cycles.iter().map(|c| f64::from(c.complexity)).sum::<f64>()
                    / cycles.len() as f64;
                SprintBucket {
                    sprint,
                    points: total(cycles.iter().map(|c| c.points)),
                    cycles: cycles.len(),
                    complexity_avg,
                    aim_avg: average_rating(&cycles),
                }
            })
            .collect()
    }

    pub fn overview(&self, buildings: &[Building], period: PeriodFilter) -> Overview {
        let tasks: Vec<&Task> = all_tasks(buildings).collect();
        let cycles: Vec<Contribution> = tasks
            .iter()
            .flat_map(|t| contributions(t))
            .filter(|c| period.includes(c.sprint))
            .collect();
        let total_xp = total(all_tasks(buildings).flat_map(contributions).map(|c| c.xp));

        Overview {
            task_count: tasks.len(),
            done_count: tasks.iter().filter(|t| t.status.is_terminal()).count(),
            planned_pa: planned_points(tasks.iter().copied()),
            completed_pa: total(cycles.iter().map(|c| c.points)),
            average_rating: average_rating(&cycles),
            guild: self.progression.guild_progress(total_xp),
        }
    }
}

fn all_tasks(buildings: &[Building]) -> impl Iterator<Item = &Task> {
    buildings.iter().flat_map(|b| b.tasks.iter())
}

/// Tasks tagged with the squad, or living on one of its buildings.
fn squad_tasks(squad_id: Uuid, buildings: &[Building]) -> impl Iterator<Item = &Task> {
    buildings.iter().flat_map(move |b| {
        b.tasks.iter().filter(move |t| {
            t.squad_id == Some(squad_id) || (t.squad_id.is_none() && b.squad_id == Some(squad_id))
        })
    })
}

fn planned_points<'a>(tasks: impl Iterator<Item = &'a Task>) -> u64 {
    total(tasks.filter(|t| !t.status.is_terminal()).map(task_points))
}

fn total(points: impl Iterator<Item = u64>) -> u64 {
    points.fold(0, u64::saturating_add)
}

fn average_rating(cycles: &[Contribution]) -> Option<f64> {
    let rated: Vec<f64> = cycles.iter().filter_map(|c| c.aim.map(f64::from)).collect();
    if rated.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let avg = rated.iter().sum::<f64>() / rated.len() as f64;
    Some(avg)
}

fn rank(mut totals: Vec<(Uuid, String, u64)>) -> Vec<LeaderboardEntry> {
    // sort_by is stable
    totals.sort_by(|a, b| b.2.cmp(&a.2));
    totals
        .into_iter()
        .enumerate()
        .map(|(i, (id, name, total_points))| LeaderboardEntry {
            rank: i + 1,
            id,
            name,
            total_points,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::models::{BuildingKind, HistoryEntry, ParticipantAward, Role};

    fn graded(building: &Building, member: Uuid, points: u64, aim: u8, sprint: u32) -> Task {
        let mut task = Task::new("Graded", building.id, member).with_status(TaskStatus::Done);
        task.final_pa = Some(points);
        task.history.push(HistoryEntry {
            timestamp: Utc::now(),
            aim,
            points,
            xp: points * 10,
            coins: points,
            participants: vec![member],
            awards: vec![ParticipantAward {
                participant_id: member,
                points,
                xp: points * 10,
                coins: points,
            }],
            feedback: None,
            sprint,
        });
        task
    }

    struct World {
        squads: Vec<Squad>,
        members: Vec<Member>,
        buildings: Vec<Building>,
    }

    fn world() -> World {
        let red = Squad::new("Red", "#f00");
        let blue = Squad::new("Blue", "#00f");
        let ada = Member::new("Ada", Role::Executor).with_squad(red.id);
        let lin = Member::new("Lin", Role::Executor).with_squad(blue.id);

        let mut red_hq = Building::new("Red app", BuildingKind::Project, ada.id).with_squad(red.id);
        let t1 = graded(&red_hq, ada.id, 10, 1, 1);
        let t2 = graded(&red_hq, ada.id, 6, 3, 2);
        let open = Task::new("Open", red_hq.id, ada.id).with_size(8);
        red_hq.tasks.extend([t1, t2, open]);

        let mut blue_app = Building::new("Blue app", BuildingKind::Project, lin.id).with_squad(blue.id);
        let t3 = graded(&blue_app, lin.id, 16, 2, 1);
        blue_app.tasks.push(t3);

        World {
            squads: vec![red, blue],
            members: vec![ada, lin],
            buildings: vec![red_hq, blue_app],
        }
    }

    #[test]
    fn test_building_stats() {
        let w = world();
        let stats = AggregationReporter::default().building_stats(&w.buildings[0]);
        assert_eq!(stats.task_count, 3);
        assert_eq!(stats.done_count, 2);
        assert_eq!(stats.planned_pa, 8);
        // final PA plus history of both graded tasks
        assert_eq!(stats.concluded_pa, 32);
        assert_eq!(stats.ceiling, 100);
        assert!((stats.percent_used - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_squad_stats_respect_period() {
        let w = world();
        let reporter = AggregationReporter::default();
        let all = reporter.squad_stats(&w.squads[0], &w.buildings, PeriodFilter::All);
        assert_eq!(all.completed_pa, 16);
        assert_eq!(all.cycles, 2);
        assert_eq!(all.average_rating, Some(2.0));
        assert_eq!(all.team.total_xp, 160);

        let sprint_two = reporter.squad_stats(&w.squads[0], &w.buildings, PeriodFilter::Sprint(2));
        assert_eq!(sprint_two.completed_pa, 6);
        assert_eq!(all.planned_pa, 8);
        // the open task was never pulled into a sprint
        assert_eq!(sprint_two.planned_pa, 0);
    }

    #[test]
    fn test_squad_planned_pa_follows_sprint_tags() {
        let mut w = world();
        w.buildings[0].tasks[2].sprint_history.insert(2);
        let reporter = AggregationReporter::default();

        let sprint_two = reporter.squad_stats(&w.squads[0], &w.buildings, PeriodFilter::Sprint(2));
        assert_eq!(sprint_two.planned_pa, 8);
        let sprint_one = reporter.squad_stats(&w.squads[0], &w.buildings, PeriodFilter::Sprint(1));
        assert_eq!(sprint_one.planned_pa, 0);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let w = world();
        let mut buildings = w.buildings;
        let mut huge = graded(&buildings[0], w.members[0].id, 1, 2, 2);
        huge.final_pa = Some(u64::MAX);
        huge.history[0].points = u64::MAX;
        huge.history[0].awards[0].points = u64::MAX;
        buildings[0].tasks.push(huge);
        let reporter = AggregationReporter::default();

        let stats = reporter.squad_stats(&w.squads[0], &buildings, PeriodFilter::All);
        assert_eq!(stats.completed_pa, u64::MAX);
        assert_eq!(reporter.overview(&buildings, PeriodFilter::All).completed_pa, u64::MAX);
        let board = reporter.member_leaderboard(&w.members, &buildings, PeriodFilter::All);
        assert_eq!(board[0].total_points, u64::MAX);
    }

    #[test]
    fn test_leaderboards_are_stable_on_ties() {
        let w = world();
        let reporter = AggregationReporter::default();
        let board = reporter.squad_leaderboard(&w.squads, &w.buildings, PeriodFilter::All);
        // Both squads sit at 16 points; input order wins.
        assert_eq!(board[0].name, "Red");
        assert_eq!(board[1].name, "Blue");
        assert_eq!(board[1].rank, 2);

        let sprint_one = reporter.member_leaderboard(&w.members, &w.buildings, PeriodFilter::Sprint(1));
        assert_eq!(sprint_one[0].name, "Lin");
        assert_eq!(sprint_one[0].total_points, 16);
        assert_eq!(sprint_one[1].total_points, 10);
    }

    #[test]
    fn test_sprint_series_buckets() {
        let w = world();
        let series = AggregationReporter::default().sprint_series(&w.buildings);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].sprint, 1);
        assert_eq!(series[0].points, 26);
        assert_eq!(series[0].aim_avg, Some(1.5));
        assert_eq!(series[1].points, 6);
    }

    #[test]
    fn test_reporting_is_idempotent() {
        let w = world();
        let reporter = AggregationReporter::default();
        let first = reporter.overview(&w.buildings, PeriodFilter::All);
        let second = reporter.overview(&w.buildings, PeriodFilter::All);
        assert_eq!(first, second);
        assert_eq!(first.completed_pa, 32);
        assert_eq!(first.planned_pa, 8);
        assert_eq!(first.guild.level, 1);
    }
}
