//! Level, experience and reputation arithmetic.

use serde::Serialize;

use crate::domain::models::{GuildBand, LevelCurve, ProgressionConfig, ProgressionProfile, TeamProgression};

/// What changed when a reward was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub from: u32,
    pub to: u32,
}

impl LevelChange {
    pub fn leveled_up(&self) -> bool {
        self.to > self.from
    }
}

/// Tribal-center level derived from total experience.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildProgress {
    pub level: u32,
    pub total_xp: u64,
    /// XP needed for the next band, `None` at the top band
    pub next_band_xp: Option<u64>,
    pub progress_percent: f64,
}

#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    config: ProgressionConfig,
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::new(ProgressionConfig::default())
    }
}

impl ProgressionEngine {
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// XP needed to leave `level` on the member curve.
    pub fn player_threshold(&self, level: u32) -> u64 {
        threshold(self.config.player_curve, level)
    }

    pub fn squad_threshold(&self, level: u32) -> u64 {
        threshold(self.config.squad_curve, level)
    }

    pub fn new_profile(&self, member_id: uuid::Uuid) -> ProgressionProfile {
        ProgressionProfile::new(member_id, self.player_threshold(1))
    }

    /// Add a reward to a profile and roll over as many levels as the XP covers.
    ///
    /// Leaves `current_xp < next_level_xp`.
    pub fn apply_reward(
        &self,
        profile: &mut ProgressionProfile,
        points: u64,
        xp: u64,
        coins: u64,
        stars: u8,
    ) -> LevelChange {
        let from = profile.level;

        profile.total_points = profile.total_points.saturating_add(points);
        profile.coins = profile.coins.saturating_add(coins);
        profile.current_xp = profile.current_xp.saturating_add(xp);
        if profile.next_level_xp == 0 {
            profile.next_level_xp = self.player_threshold(profile.level);
        }

        while profile.current_xp >= profile.next_level_xp {
            profile.current_xp -= profile.next_level_xp;
            profile.level = profile.level.saturating_add(1);
            profile.next_level_xp = self.player_threshold(profile.level);
        }

        profile.reputation = self.next_reputation(profile.reputation, stars);

        LevelChange {
            from,
            to: profile.level,
        }
    }

    /// Exponential moving average towards the rating's stars.
    pub fn next_reputation(&self, current: f64, stars: u8) -> f64 {
        let decay = self.config.reputation_decay.clamp(0.0, 1.0);
        current * decay + f64::from(stars) * (1.0 - decay)
    }

    /// Squad level from the total XP of its graded cycles.
    pub fn team_progression(&self, total_xp: u64) -> TeamProgression {
        let mut level = 1;
        let mut remaining = total_xp;
        let mut next = self.squad_threshold(level);
        while remaining >= next {
            remaining -= next;
            level += 1;
            next = self.squad_threshold(level);
        }

        #[allow(clippy::cast_precision_loss)]
        let progress_percent = remaining as f64 / next as f64 * 100.0;

        TeamProgression {
            level,
            total_xp,
            current_xp_in_level: remaining,
            next_level_threshold: next,
            progress_percent,
        }
    }

    pub fn guild_progress(&self, total_xp: u64) -> GuildProgress {
        let mut bands: Vec<GuildBand> = self.config.guild_bands.clone();
        bands.sort_by_key(|b| b.min_xp);

        let current = bands.iter().rev().find(|b| b.min_xp <= total_xp);
        let level = current.map_or(1, |b| b.level);
        let floor = current.map_or(0, |b| b.min_xp);
        let next_band_xp = bands.iter().find(|b| b.min_xp > total_xp).map(|b| b.min_xp);

        #[allow(clippy::cast_precision_loss)]
        let progress_percent = match next_band_xp {
            Some(next) if next > floor => (total_xp - floor) as f64 / (next - floor) as f64 * 100.0,
            _ => 100.0,
        };

        GuildProgress {
            level,
            total_xp,
            next_band_xp,
            progress_percent,
        }
    }
}

/// `floor(base × growth^(level − 1))`, never below 1.
fn threshold(curve: LevelCurve, level: u32) -> u64 {
    let growth = if curve.growth.is_finite() { curve.growth.max(1.0) } else { 1.0 };
    let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
    #[allow(clippy::cast_precision_loss)]
    let raw = (curve.base_xp.max(1) as f64 * growth.powi(exponent)).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = if raw.is_finite() { raw as u64 } else { u64::MAX };
    value.max(1)
}
