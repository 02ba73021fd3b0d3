//! Splitting a task's base points between its participants.

use crate::domain::errors::GradingError;
use crate::domain::models::{CollaborationRule, Task};
use crate::services::scoring::Share;

/// Check a negotiated split against the task's base points.
///
/// The shares must sum to `base` exactly and may only name participants.
pub fn validate_distribution(task: &Task, base: u64) -> Result<(), GradingError> {
    let CollaborationRule::Negotiated { distribution } = &task.rule else {
        return Ok(());
    };

    let actual: u64 = distribution.values().copied().fold(0, u64::saturating_add);
    let foreign_share = distribution
        .iter()
        .any(|(member, points)| *points > 0 && !task.is_participant(*member));

    if actual != base || foreign_share {
        return Err(GradingError::DistributionMismatch {
            expected: base,
            actual,
        });
    }
    Ok(())
}

/// Per-participant shares, in participant order.
///
/// Integrated and fixed tasks give every participant the full base amount.
/// Negotiated tasks use the validated split; unlisted participants get 0.
pub fn participant_shares(task: &Task, base: u64) -> Result<Vec<Share>, GradingError> {
    validate_distribution(task, base)?;

    let shares = task
        .participants
        .iter()
        .map(|&participant_id| {
            let points = match &task.rule {
                CollaborationRule::Negotiated { distribution } => {
                    distribution.get(&participant_id).copied().unwrap_or(0)
                }
                CollaborationRule::Integrated | CollaborationRule::Fixed(_) => base,
            };
            Share {
                participant_id,
                points,
            }
        })
        .collect();
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::*;

    fn negotiated(split: &[(Uuid, u64)]) -> Task {
        let creator = split.first().map_or_else(Uuid::new_v4, |(id, _)| *id);
        let distribution: BTreeMap<Uuid, u64> = split.iter().copied().collect();
        Task::new("Pair on migration", Uuid::new_v4(), creator)
            .with_size(5)
            .with_complexity(2)
            .with_rule(CollaborationRule::Negotiated { distribution }, 1.0)
            .with_participants(split.iter().map(|(id, _)| *id))
    }

    #[test]
    fn test_mismatched_split_is_rejected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let task = negotiated(&[(a, 4), (b, 5)]);
        assert_eq!(
            validate_distribution(&task, 10),
            Err(GradingError::DistributionMismatch {
                expected: 10,
                actual: 9
            })
        );
    }

    #[test]
    fn test_exact_split_yields_shares() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let task = negotiated(&[(a, 4), (b, 6)]);
        let shares = participant_shares(&task, 10).unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0], Share { participant_id: a, points: 4 });
        assert_eq!(shares[1], Share { participant_id: b, points: 6 });
    }

    #[test]
    fn test_share_for_non_participant_is_mismatch() {
        let a = Uuid::new_v4();
        let mut task = negotiated(&[(a, 10)]);
        if let CollaborationRule::Negotiated { distribution } = &mut task.rule {
            distribution.insert(Uuid::new_v4(), 0);
        }
        assert!(validate_distribution(&task, 10).is_ok());

        if let CollaborationRule::Negotiated { distribution } = &mut task.rule {
            distribution.insert(a, 6);
            distribution.insert(Uuid::new_v4(), 4);
        }
        assert!(validate_distribution(&task, 10).is_err());
    }

    #[test]
    fn test_integrated_gives_everyone_full_base() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();
        let task = Task::new("Retro", Uuid::new_v4(), creator).with_participants([creator, other]);
        let shares = participant_shares(&task, 8).unwrap();
        assert!(shares.iter().all(|s| s.points == 8));
        assert_eq!(shares.len(), 2);
    }
}
