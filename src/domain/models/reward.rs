//! Reward batches produced by grading.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::ParticipantAward;

/// All participant rewards of one graded cycle, applied atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBatch {
    /// `"{task_id}:{cycle}"`; replaying a batch with the same key is a no-op
    pub key: String,
    pub task_id: Uuid,
    pub cycle: u32,
    pub aim: u8,
    /// Reputation stars the rating contributes
    pub stars: u8,
    pub awards: Vec<ParticipantAward>,
}

impl RewardBatch {
    pub fn new(task_id: Uuid, cycle: u32, aim: u8, stars: u8, awards: Vec<ParticipantAward>) -> Self {
        Self {
            key: Self::key_for(task_id, cycle),
            task_id,
            cycle,
            aim,
            stars,
            awards,
        }
    }

    pub fn key_for(task_id: Uuid, cycle: u32) -> String {
        format!("{task_id}:{cycle}")
    }

    pub fn total_points(&self) -> u64 {
        self.awards.iter().map(|a| a.points).sum()
    }
}
