//! Point formula and the AIM rating scale.

use uuid::Uuid;

use crate::domain::errors::GradingError;
use crate::domain::models::{AimOption, ScoringConfig, Task, TaskStatus};

/// Base points of a task: `floor(size × complexity × rule_multiplier)`.
///
/// Non-finite or negative products yield 0.
pub fn compute_base_points(size: u32, complexity: u8, rule_multiplier: f64) -> u64 {
    floor_points(f64::from(size) * f64::from(complexity), rule_multiplier)
}

/// Same as [`compute_base_points`] for partially filled drafts.
///
/// Missing size counts as 0, missing complexity and multiplier as 1.
pub fn compute_draft_points(
    size: Option<u32>,
    complexity: Option<u8>,
    rule_multiplier: Option<f64>,
) -> u64 {
    compute_base_points(size.unwrap_or(0), complexity.unwrap_or(1), rule_multiplier.unwrap_or(1.0))
}

/// `floor(amount × multiplier)` clamped to the non-negative integers.
pub fn floor_points(amount: f64, multiplier: f64) -> u64 {
    let value = (amount * multiplier).floor();
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    // Saturating float-to-int cast.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let points = value as u64;
    points
}

pub fn base_points(task: &Task) -> u64 {
    compute_base_points(task.size, task.complexity, task.rule_multiplier)
}

/// Points a task stands for in planning views: the final PA once it is
/// done, the base points otherwise.
pub fn task_points(task: &Task) -> u64 {
    match (task.status, task.final_pa) {
        (TaskStatus::Done, Some(final_pa)) => final_pa,
        _ => base_points(task),
    }
}

/// Ordinal grading scale with a neutral default.
#[derive(Debug, Clone)]
pub struct AimScale {
    options: Vec<AimOption>,
    neutral: u8,
}

impl AimScale {
    pub fn new(options: Vec<AimOption>, neutral: u8) -> Self {
        Self { options, neutral }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.aim_scale.clone(), config.neutral_aim)
    }

    pub fn options(&self) -> &[AimOption] {
        &self.options
    }

    pub fn get(&self, value: u8) -> Option<&AimOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Look up a rating, falling back to the neutral value when omitted.
    pub fn resolve(&self, rating: Option<u8>) -> Result<&AimOption, GradingError> {
        let value = rating.unwrap_or(self.neutral);
        self.get(value).ok_or(GradingError::UnknownRating(value))
    }

    pub fn stars(&self, value: u8) -> u8 {
        self.get(value).map_or(0, |o| o.stars)
    }
}

impl Default for AimScale {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// Reward factors applied to final points.
#[derive(Debug, Clone, Copy)]
pub struct RewardFactors {
    pub xp_per_point: u64,
    pub coins_per_point: u64,
}

impl RewardFactors {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            xp_per_point: config.xp_per_point,
            coins_per_point: config.coins_per_point,
        }
    }

    pub fn xp(&self, points: u64) -> u64 {
        points.saturating_mul(self.xp_per_point)
    }

    pub fn coins(&self, points: u64) -> u64 {
        points.saturating_mul(self.coins_per_point)
    }
}

/// A participant's share before the rating multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share {
    pub participant_id: Uuid,
    pub points: u64,
}
