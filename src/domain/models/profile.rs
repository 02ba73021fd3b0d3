//! Members, squads and progression profiles.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organizational role of a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Top-level authority
    Master,
    /// Delegated grader
    Mentor,
    #[default]
    Executor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Mentor => "mentor",
            Self::Executor => "executor",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "master" => Some(Self::Master),
            "mentor" => Some(Self::Mentor),
            "executor" => Some(Self::Executor),
            _ => None,
        }
    }

    pub fn can_grade(&self) -> bool {
        matches!(self, Self::Master | Self::Mentor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub squad_id: Option<Uuid>,
    pub role: Role,
}

impl Member {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            squad_id: None,
            role,
        }
    }

    pub fn with_squad(mut self, squad_id: Uuid) -> Self {
        self.squad_id = Some(squad_id);
        self
    }
}

/// A team of members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squad {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
}

impl Squad {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: color.into(),
            description: None,
        }
    }
}

/// Level/experience/reputation accumulator of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionProfile {
    pub member_id: Uuid,
    pub level: u32,
    pub current_xp: u64,
    pub next_level_xp: u64,
    pub total_points: u64,
    pub coins: u64,
    pub reputation: f64,
}

impl ProgressionProfile {
    /// Fresh level-1 profile with the given first threshold.
    pub fn new(member_id: Uuid, first_threshold: u64) -> Self {
        Self {
            member_id,
            level: 1,
            current_xp: 0,
            next_level_xp: first_threshold.max(1),
            total_points: 0,
            coins: 0,
            reputation: 0.0,
        }
    }
}

/// Squad level derived from the squad's graded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProgression {
    pub level: u32,
    pub total_xp: u64,
    pub current_xp_in_level: u64,
    pub next_level_threshold: u64,
    pub progress_percent: f64,
}
