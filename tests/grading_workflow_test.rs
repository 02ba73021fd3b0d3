//! End-to-end grading through a board session backed by SQLite.

mod common;

use std::collections::BTreeMap;

use chrono::Utc;
use squadforge::domain::errors::{DomainError, GradingError};
use squadforge::domain::models::{
    CollaborationRule, RecurrenceMode, RenewalTrigger, TaskStatus,
};
use squadforge::services::{
    BoardSession, CycleOutcome, GradeRequest, NewTask, RenewalDecision, RuleChoice, TaskUpdate,
};
use uuid::Uuid;

use common::{fixture, Fixture};

fn new_task(fx: &Fixture, content: &str, size: u32, complexity: u8, rule: RuleChoice) -> NewTask {
    NewTask {
        building_id: Some(fx.project.id),
        content: content.to_string(),
        size: Some(size),
        complexity: Some(complexity),
        rule: Some(rule),
        participants: vec![fx.alice.id, fx.bob.id],
        ..NewTask::default()
    }
}

async fn open(fx: &Fixture, actor: Uuid) -> BoardSession {
    BoardSession::open(fx.config.clone(), fx.repos.clone(), Some(actor))
        .await
        .expect("session should open")
}

async fn create_in_review(session: &BoardSession, input: NewTask) -> Uuid {
    let task = session
        .execute(|service, state| service.create_task(state, input))
        .await
        .expect("task should be created");
    session
        .execute(|service, state| service.move_task(state, task.id, TaskStatus::Review))
        .await
        .expect("task should move to review");
    task.id
}

async fn grade(session: &BoardSession, task_id: Uuid, aim: Option<u8>) -> Result<CycleOutcome, DomainError> {
    session
        .execute(|service, state| {
            service.grade_task(
                state,
                task_id,
                GradeRequest {
                    aim,
                    feedback: Some("solid".to_string()),
                },
                Utc::now(),
            )
        })
        .await
        .map(|outcome| outcome.plan.outcome)
}

#[tokio::test]
async fn test_graded_task_rewards_every_participant() {
    let fx = fixture().await;
    let session = open(&fx, fx.master.id).await;

    // 5 × 2 = 10 base points, rated "above expectations" (×1.2)
    let task_id = create_in_review(&session, new_task(&fx, "Ship login", 5, 2, RuleChoice::Integrated)).await;
    let outcome = grade(&session, task_id, Some(2)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed);
    session.shutdown().await;

    let task = fx.repos.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.final_pa, Some(12));
    assert_eq!(task.final_xp, Some(120));
    assert_eq!(task.aim, Some(2));
    assert_eq!(task.feedback.as_deref(), Some("solid"));
    assert_eq!(task.history.len(), 1);
    assert!(task.sprint_history.contains(&1));

    for member in [&fx.alice, &fx.bob] {
        let profile = fx.repos.profiles.get_profile(member.id).await.unwrap().unwrap();
        assert_eq!(profile.total_points, 12);
        assert_eq!(profile.current_xp, 120);
        assert_eq!(profile.coins, 12);
        assert!(profile.reputation > 0.0);
    }
    assert!(fx.repos.profiles.get_profile(fx.master.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_negotiated_mismatch_is_rejected_without_changes() {
    let fx = fixture().await;
    let session = open(&fx, fx.mentor.id).await;

    let task_id = create_in_review(&session, new_task(&fx, "Pair on search", 5, 2, RuleChoice::Negotiated)).await;
    let shares = BTreeMap::from([(fx.alice.id, 3), (fx.bob.id, 3)]);
    session
        .execute(|service, state| {
            service.update_task(
                state,
                task_id,
                TaskUpdate {
                    distribution: Some(shares),
                    ..TaskUpdate::default()
                },
            )
        })
        .await
        .unwrap();

    let err = grade(&session, task_id, None).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Grading(GradingError::DistributionMismatch { expected: 10, actual: 6 })
    ));

    let task = session.read(|_, state| state.task(task_id).cloned()).await.unwrap();
    assert_eq!(task.status, TaskStatus::Review);
    assert!(task.history.is_empty());
    assert!(task.final_pa.is_none());

    // A matching split goes through and pays each share.
    let shares = BTreeMap::from([(fx.alice.id, 7), (fx.bob.id, 3)]);
    session
        .execute(|service, state| {
            service.update_task(
                state,
                task_id,
                TaskUpdate {
                    distribution: Some(shares),
                    ..TaskUpdate::default()
                },
            )
        })
        .await
        .unwrap();
    grade(&session, task_id, None).await.unwrap();
    session.shutdown().await;

    let alice = fx.repos.profiles.get_profile(fx.alice.id).await.unwrap().unwrap();
    let bob = fx.repos.profiles.get_profile(fx.bob.id).await.unwrap().unwrap();
    assert_eq!(alice.total_points, 7);
    assert_eq!(bob.total_points, 3);
}

#[tokio::test]
async fn test_building_capacity_blocks_grading() {
    let fx = fixture().await;
    let session = open(&fx, fx.master.id).await;

    // A level-1 project holds 100 PA. A graded one-off counts its final
    // PA and its history entry: 13 × 2 = 26 twice.
    let first = create_in_review(&session, new_task(&fx, "Migrate billing", 13, 2, RuleChoice::Integrated)).await;
    grade(&session, first, None).await.unwrap();

    let second = create_in_review(&session, new_task(&fx, "Migrate invoices", 21, 3, RuleChoice::Integrated)).await;
    let err = grade(&session, second, None).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Grading(GradingError::CapacityExceeded {
            current: 52,
            candidate: 63,
            limit: 100
        })
    ));

    let status = session
        .read(|_, state| state.task(second).map(|t| t.status))
        .await;
    assert_eq!(status, Some(TaskStatus::Review));
    session.shutdown().await;
}

#[tokio::test]
async fn test_executor_cannot_grade() {
    let fx = fixture().await;
    let session = open(&fx, fx.alice.id).await;

    let task_id = create_in_review(&session, new_task(&fx, "Fix flaky test", 2, 1, RuleChoice::Integrated)).await;
    let err = grade(&session, task_id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::Grading(GradingError::Unauthorized(_))));
    session.shutdown().await;

    let task = fx.repos.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Review);
    assert!(fx.repos.profiles.get_profile(fx.alice.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_routine_cycles_until_renewal_decision() {
    let fx = fixture().await;
    let session = open(&fx, fx.master.id).await;
    let rule = RuleChoice::Fixed {
        mode: RecurrenceMode::Quantity,
        quantity_limit: Some(2),
        deadline: None,
    };

    let task_id = create_in_review(&session, new_task(&fx, "Weekly backup check", 1, 1, rule)).await;
    assert_eq!(
        grade(&session, task_id, None).await.unwrap(),
        CycleOutcome::Recycled { cycle_count: 1 }
    );
    let status = session.read(|_, state| state.task(task_id).map(|t| t.status)).await;
    assert_eq!(status, Some(TaskStatus::Backlog));

    session
        .execute(|service, state| service.move_task(state, task_id, TaskStatus::Review))
        .await
        .unwrap();
    assert_eq!(
        grade(&session, task_id, None).await.unwrap(),
        CycleOutcome::RenewalRequired {
            cycle_count: 2,
            trigger: RenewalTrigger::Quantity
        }
    );

    let err = session
        .execute(|service, state| service.move_task(state, task_id, TaskStatus::Todo))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Grading(GradingError::RenewalPending(_))));

    let renewed = session
        .execute(|service, state| service.resolve_renewal(state, task_id, RenewalDecision::Renew))
        .await
        .unwrap();
    assert_eq!(renewed.status, TaskStatus::Backlog);
    match &renewed.rule {
        CollaborationRule::Fixed(recurrence) => {
            assert_eq!(recurrence.cycle_count, 0);
            assert!(recurrence.pending_renewal.is_none());
        }
        other => panic!("expected a routine, got {other:?}"),
    }

    // Two more cycles reach the limit again; this time the routine is declined.
    for _ in 0..2 {
        session
            .execute(|service, state| service.move_task(state, task_id, TaskStatus::Review))
            .await
            .unwrap();
        grade(&session, task_id, None).await.unwrap();
    }
    let declined = session
        .execute(|service, state| service.resolve_renewal(state, task_id, RenewalDecision::Decline))
        .await
        .unwrap();
    assert_eq!(declined.status, TaskStatus::Done);

    let err = session
        .execute(|service, state| service.move_task(state, task_id, TaskStatus::Review))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Grading(GradingError::RoutineClosed(_))));
    session.shutdown().await;

    let stored = fx.repos.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(stored.history.len(), 4);
    match stored.rule {
        CollaborationRule::Fixed(recurrence) => assert!(recurrence.closed),
        other => panic!("expected a routine, got {other:?}"),
    }
    let alice = fx.repos.profiles.get_profile(fx.alice.id).await.unwrap().unwrap();
    assert_eq!(alice.total_points, 4);
}

#[tokio::test]
async fn test_completed_tasks_cannot_be_moved_back() {
    let fx = fixture().await;
    let session = open(&fx, fx.master.id).await;

    let task_id = create_in_review(&session, new_task(&fx, "Write runbook", 3, 1, RuleChoice::Integrated)).await;
    grade(&session, task_id, None).await.unwrap();

    let err = session
        .execute(|service, state| service.move_task(state, task_id, TaskStatus::Doing))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    session.shutdown().await;
}
