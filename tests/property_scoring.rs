//! Property tests for the point formula, capacity and level progression.

use chrono::Utc;
use proptest::prelude::*;
use squadforge::domain::models::{
    Building, BuildingKind, CapacityConfig, HistoryEntry, ProgressionConfig, Task, TaskStatus,
    FIBONACCI_SIZES,
};
use squadforge::services::{compute_base_points, CapacityDecision, CapacityGuard, ProgressionEngine};
use uuid::Uuid;

fn fibonacci_size() -> impl Strategy<Value = u32> {
    prop::sample::select(FIBONACCI_SIZES.to_vec())
}

/// A building whose completed tasks already absorbed `absorbed` points.
fn building_with(level: u32, absorbed: &[u64]) -> Building {
    let owner = Uuid::new_v4();
    let mut building = Building::new("Prop", BuildingKind::Project, owner).with_level(level);
    for points in absorbed {
        let mut task = Task::new("done", building.id, owner).with_status(TaskStatus::Done);
        task.final_pa = Some(*points);
        building.tasks.push(task);
    }
    building
}

fn cycle(owner: Uuid, points: u64, sprint: u32) -> HistoryEntry {
    HistoryEntry {
        timestamp: Utc::now(),
        aim: 2,
        points,
        xp: points * 10,
        coins: points,
        participants: vec![owner],
        awards: Vec::new(),
        feedback: None,
        sprint,
    }
}

/// One task per `(done, final_pa, graded cycles)`; routines sit in BACKLOG between cycles.
fn building_with_history(level: u32, tasks: &[(bool, u64, Vec<u64>)]) -> Building {
    let owner = Uuid::new_v4();
    let mut building = Building::new("Prop", BuildingKind::Project, owner).with_level(level);
    for (done, final_pa, cycles) in tasks {
        let status = if *done { TaskStatus::Done } else { TaskStatus::Backlog };
        let mut task = Task::new("graded", building.id, owner).with_status(status);
        task.final_pa = Some(*final_pa);
        task.history = cycles
            .iter()
            .enumerate()
            .map(|(i, points)| cycle(owner, *points, i as u32 + 1))
            .collect();
        building.tasks.push(task);
    }
    building
}

#[test]
fn done_task_with_history_counts_final_pa_and_cycles() {
    let guard = CapacityGuard::new(CapacityConfig::default());
    let building = building_with_history(1, &[(true, 10, vec![10])]);
    assert_eq!(guard.accumulated(&building), 20);
}

#[test]
fn recycled_routine_counts_every_cycle() {
    let guard = CapacityGuard::new(CapacityConfig::default());
    let building = building_with_history(1, &[(false, 7, vec![4, 6, 5])]);
    assert_eq!(guard.accumulated(&building), 15);
    assert_eq!(
        guard.check(&building, 86),
        CapacityDecision::Reject { current: 15, candidate: 86, limit: 100 }
    );
}

proptest! {
    #[test]
    fn accumulated_is_done_final_pa_plus_all_history(
        level in 1u32..=5,
        tasks in prop::collection::vec(
            (any::<bool>(), 0u64..200, prop::collection::vec(0u64..100, 0..5)),
            0..6,
        ),
        candidate in 0u64..500,
    ) {
        let config = CapacityConfig::default();
        let limit = config.ceiling_for(level);
        let guard = CapacityGuard::new(config);
        let building = building_with_history(level, &tasks);
        let current: u64 = tasks
            .iter()
            .map(|(done, final_pa, cycles)| {
                let own = if *done { *final_pa } else { 0 };
                own + cycles.iter().sum::<u64>()
            })
            .sum();

        prop_assert_eq!(guard.accumulated(&building), current);
        match guard.check(&building, candidate) {
            CapacityDecision::Allow { total } => {
                prop_assert!(current + candidate <= limit);
                prop_assert_eq!(total, current + candidate);
            }
            CapacityDecision::Reject { current: reported, .. } => {
                prop_assert!(current + candidate > limit);
                prop_assert_eq!(reported, current);
            }
        }
    }

    #[test]
    fn base_points_match_formula(size in fibonacci_size(), complexity in 1u8..=3, multiplier in 0.0f64..3.0) {
        let points = compute_base_points(size, complexity, multiplier);
        let expected = (f64::from(size) * f64::from(complexity) * multiplier).floor();
        prop_assert_eq!(points as f64, expected);
    }

    #[test]
    fn neutral_multiplier_is_exact_product(size in fibonacci_size(), complexity in 1u8..=3) {
        prop_assert_eq!(compute_base_points(size, complexity, 1.0), u64::from(size) * u64::from(complexity));
    }

    #[test]
    fn negative_multiplier_never_awards(size in fibonacci_size(), complexity in 1u8..=3, multiplier in -5.0f64..0.0) {
        prop_assert_eq!(compute_base_points(size, complexity, multiplier), 0);
    }

    #[test]
    fn capacity_accepts_exactly_up_to_ceiling(
        level in 1u32..=5,
        absorbed in prop::collection::vec(0u64..200, 0..6),
        candidate in 0u64..500,
    ) {
        let config = CapacityConfig::default();
        let limit = config.ceiling_for(level);
        let guard = CapacityGuard::new(config);
        let building = building_with(level, &absorbed);
        let current: u64 = absorbed.iter().sum();

        match guard.check(&building, candidate) {
            CapacityDecision::Allow { total } => {
                prop_assert!(current + candidate <= limit);
                prop_assert_eq!(total, current + candidate);
            }
            CapacityDecision::Reject { current: reported, limit: reported_limit, .. } => {
                prop_assert!(current + candidate > limit);
                prop_assert_eq!(reported, current);
                prop_assert_eq!(reported_limit, limit);
            }
        }
    }

    #[test]
    fn progression_keeps_xp_below_threshold(rewards in prop::collection::vec((0u64..500, 1u8..=5), 1..20)) {
        let engine = ProgressionEngine::new(ProgressionConfig::default());
        let mut profile = engine.new_profile(Uuid::new_v4());
        let mut total_points = 0;

        for (points, stars) in rewards {
            let before = profile.level;
            let change = engine.apply_reward(&mut profile, points, points * 10, points, stars);
            total_points += points;

            prop_assert!(profile.current_xp < profile.next_level_xp);
            prop_assert!(change.to >= before);
            prop_assert_eq!(profile.next_level_xp, engine.player_threshold(profile.level));
            prop_assert!((0.0..=5.0).contains(&profile.reputation));
        }
        prop_assert_eq!(profile.total_points, total_points);
        prop_assert_eq!(profile.coins, total_points);
    }
}
