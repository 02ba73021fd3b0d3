//! Task domain model.
//!
//! Tasks are the work items that move across the board lanes, get graded
//! and turn into points, experience and coins for their participants.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Allowed effort sizes.
pub const FIBONACCI_SIZES: [u32; 7] = [1, 2, 3, 5, 8, 13, 21];

/// Allowed complexity values.
pub const COMPLEXITY_RANGE: std::ops::RangeInclusive<u8> = 1..=3;

/// Board lane of a task.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    Doing,
    Blocked,
    Review,
    Done,
}

impl TaskStatus {
    /// Lanes in board order.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::Doing,
        TaskStatus::Blocked,
        TaskStatus::Review,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::Doing => "DOING",
            Self::Blocked => "BLOCKED",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BACKLOG" => Some(Self::Backlog),
            "TODO" | "TO_DO" => Some(Self::Todo),
            "DOING" | "IN_PROGRESS" => Some(Self::Doing),
            "BLOCKED" => Some(Self::Blocked),
            "REVIEW" => Some(Self::Review),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    /// Human lane title.
    pub fn lane_label(&self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Todo => "To Do",
            Self::Doing => "Doing",
            Self::Blocked => "Blocked",
            Self::Review => "In Review",
            Self::Done => "Done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`CollaborationRule`], used for labels, multipliers and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    Integrated,
    Negotiated,
    Fixed,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integrated => "INTEGRATED",
            Self::Negotiated => "NEGOTIATED",
            Self::Fixed => "FIXED",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INTEGRATED" | "I" => Some(Self::Integrated),
            "NEGOTIATED" | "N" => Some(Self::Negotiated),
            "FIXED" | "F" => Some(Self::Fixed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Integrated => "Integrated (I)",
            Self::Negotiated => "Negotiated (N)",
            Self::Fixed => "Fixed (F)",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which limit bounds a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    Quantity,
    Deadline,
}

impl RecurrenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantity => "quantity",
            Self::Deadline => "deadline",
        }
    }
}

/// The limit that fired when a recurring task stopped cycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalTrigger {
    Quantity,
    Deadline,
}

impl RenewalTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantity => "quantity",
            Self::Deadline => "deadline",
        }
    }
}

/// Recurrence state of a FIXED (routine) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub mode: RecurrenceMode,
    /// Completed cycles since creation or the last renewal.
    #[serde(default)]
    pub cycle_count: u32,
    #[serde(default)]
    pub quantity_limit: Option<u32>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Set while the routine waits for a renew/decline decision.
    #[serde(default)]
    pub pending_renewal: Option<RenewalTrigger>,
    /// Set once a renewal was declined; the routine never cycles again.
    #[serde(default)]
    pub closed: bool,
}

impl Recurrence {
    pub fn by_quantity(limit: Option<u32>) -> Self {
        Self {
            mode: RecurrenceMode::Quantity,
            cycle_count: 0,
            quantity_limit: limit,
            deadline: None,
            pending_renewal: None,
            closed: false,
        }
    }

    pub fn by_deadline(deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            mode: RecurrenceMode::Deadline,
            cycle_count: 0,
            quantity_limit: None,
            deadline,
            pending_renewal: None,
            closed: false,
        }
    }
}

/// How a task's points are shared between its participants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CollaborationRule {
    /// Every participant receives the full base amount.
    #[default]
    Integrated,
    /// Participants receive manually assigned shares.
    Negotiated {
        #[serde(default)]
        distribution: BTreeMap<Uuid, u64>,
    },
    /// Recurring routine; every participant receives the full base amount per cycle.
    Fixed(Recurrence),
}

impl CollaborationRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Integrated => RuleKind::Integrated,
            Self::Negotiated { .. } => RuleKind::Negotiated,
            Self::Fixed(_) => RuleKind::Fixed,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        match self {
            Self::Fixed(recurrence) => Some(recurrence),
            _ => None,
        }
    }

    pub fn recurrence_mut(&mut self) -> Option<&mut Recurrence> {
        match self {
            Self::Fixed(recurrence) => Some(recurrence),
            _ => None,
        }
    }
}

/// Reward granted to one participant for one graded cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAward {
    pub participant_id: Uuid,
    pub points: u64,
    pub xp: u64,
    pub coins: u64,
}

/// One completed grading cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub aim: u8,
    /// Task-level points for the cycle.
    pub points: u64,
    pub xp: u64,
    pub coins: u64,
    pub participants: Vec<Uuid>,
    /// Positive rewards only; zero-point participants are not listed.
    #[serde(default)]
    pub awards: Vec<ParticipantAward>,
    #[serde(default)]
    pub feedback: Option<String>,
    pub sprint: u32,
}

impl HistoryEntry {
    pub fn award_for(&self, participant_id: Uuid) -> Option<&ParticipantAward> {
        self.awards.iter().find(|a| a.participant_id == participant_id)
    }
}

/// A work item on a building's board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub building_id: Uuid,
    pub squad_id: Option<Uuid>,
    pub creator_id: Uuid,
    pub assignee_id: Option<Uuid>,
    /// Title/summary shown on the card
    pub content: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub size: u32,
    pub complexity: u8,
    pub rule: CollaborationRule,
    /// Multiplier of the rule at the time it was chosen
    pub rule_multiplier: f64,
    /// Never empty, no duplicates
    pub participants: Vec<Uuid>,
    pub evidence_link: Option<String>,
    pub delivery_notes: Option<String>,
    pub reflections: Option<String>,
    /// Draft or final AIM rating
    pub aim: Option<u8>,
    pub feedback: Option<String>,
    pub final_pa: Option<u64>,
    pub final_xp: Option<u64>,
    pub final_coins: Option<u64>,
    pub history: Vec<HistoryEntry>,
    pub sprint_history: BTreeSet<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every local mutation
    pub version: u64,
}

impl Task {
    /// Draft task: backlog, size 1, complexity 1, integrated, creator as sole participant.
    pub fn new(content: impl Into<String>, building_id: Uuid, creator_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            building_id,
            squad_id: None,
            creator_id,
            assignee_id: Some(creator_id),
            content: content.into(),
            description: None,
            status: TaskStatus::Backlog,
            size: 1,
            complexity: 1,
            rule: CollaborationRule::Integrated,
            rule_multiplier: 1.0,
            participants: vec![creator_id],
            evidence_link: None,
            delivery_notes: None,
            reflections: None,
            aim: None,
            feedback: None,
            final_pa: None,
            final_xp: None,
            final_coins: None,
            history: Vec::new(),
            sprint_history: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_rule(mut self, rule: CollaborationRule, multiplier: f64) -> Self {
        self.rule = rule;
        self.rule_multiplier = multiplier;
        self
    }

    pub fn with_squad(mut self, squad_id: Uuid) -> Self {
        self.squad_id = Some(squad_id);
        self
    }

    pub fn with_participants(mut self, participants: impl IntoIterator<Item = Uuid>) -> Self {
        self.set_participants(participants);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Replace participants keeping first-seen order; an empty set falls back to the creator.
    pub fn set_participants(&mut self, participants: impl IntoIterator<Item = Uuid>) {
        let mut unique = Vec::new();
        for id in participants {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            unique.push(self.creator_id);
        }
        self.participants = unique;
    }

    pub fn rule_kind(&self) -> RuleKind {
        self.rule.kind()
    }

    pub fn is_participant(&self, member_id: Uuid) -> bool {
        self.participants.contains(&member_id)
    }

    /// Whether the member created, is assigned to, or participates in the task.
    pub fn involves(&self, member_id: Uuid) -> bool {
        self.is_participant(member_id)
            || self.creator_id == member_id
            || self.assignee_id == Some(member_id)
    }

    pub fn pending_renewal(&self) -> Option<RenewalTrigger> {
        self.rule.recurrence().and_then(|r| r.pending_renewal)
    }

    /// Drop every field that only lives for one grading cycle.
    pub fn clear_cycle_fields(&mut self) {
        self.aim = None;
        self.feedback = None;
        self.evidence_link = None;
        self.delivery_notes = None;
        self.reflections = None;
        self.final_pa = None;
        self.final_xp = None;
        self.final_coins = None;
    }

    /// Record a local mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Label used by the reporting views for a sprint number.
    pub fn sprint_label(sprint: u32) -> String {
        format!("Sprint {sprint}")
    }

    /// Validate task attributes.
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("Task needs a title/description".to_string());
        }
        if !FIBONACCI_SIZES.contains(&self.size) {
            return Err(format!(
                "Invalid size {}: must be one of {:?}",
                self.size, FIBONACCI_SIZES
            ));
        }
        if !COMPLEXITY_RANGE.contains(&self.complexity) {
            return Err(format!(
                "Invalid complexity {}: must be between 1 and 3",
                self.complexity
            ));
        }
        if !self.rule_multiplier.is_finite() || self.rule_multiplier < 0.0 {
            return Err(format!("Invalid rule multiplier {}", self.rule_multiplier));
        }
        if self.participants.is_empty() {
            return Err("Task needs at least one participant".to_string());
        }
        if let CollaborationRule::Fixed(recurrence) = &self.rule {
            if recurrence.quantity_limit == Some(0) {
                return Err("Quantity limit must be at least 1".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> Task {
        Task::new("Write onboarding guide", Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_new_task_defaults() {
        let task = draft();
        assert_eq!(task.status, TaskStatus::Backlog);
        assert_eq!(task.size, 1);
        assert_eq!(task.complexity, 1);
        assert_eq!(task.rule_kind(), RuleKind::Integrated);
        assert_eq!(task.participants, vec![task.creator_id]);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_set_participants_dedups_and_falls_back_to_creator() {
        let mut task = draft();
        let a = Uuid::new_v4();
        task.set_participants([a, a, task.creator_id]);
        assert_eq!(task.participants, vec![a, task.creator_id]);

        task.set_participants(Vec::new());
        assert_eq!(task.participants, vec![task.creator_id]);
    }

    #[test]
    fn test_validation_rejects_off_sequence_size_and_complexity() {
        assert!(draft().with_size(4).validate().is_err());
        assert!(draft().with_size(21).validate().is_ok());
        assert!(draft().with_complexity(0).validate().is_err());
        assert!(draft().with_complexity(4).validate().is_err());

        let mut blank = draft();
        blank.content = "   ".into();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_clear_cycle_fields() {
        let mut task = draft();
        task.aim = Some(2);
        task.feedback = Some("good".into());
        task.final_pa = Some(10);
        task.final_xp = Some(100);
        task.final_coins = Some(10);
        task.evidence_link = Some("https://example.org".into());

        task.clear_cycle_fields();

        assert!(task.aim.is_none());
        assert!(task.feedback.is_none());
        assert!(task.final_pa.is_none());
        assert!(task.final_xp.is_none());
        assert!(task.final_coins.is_none());
        assert!(task.evidence_link.is_none());
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("review"), Some(TaskStatus::Review));
        assert_eq!(TaskStatus::from_str("nope"), None);
    }

    #[test]
    fn test_rule_serializes_with_tag() {
        let rule = CollaborationRule::Fixed(Recurrence::by_quantity(Some(3)));
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["rule"], "fixed");
        assert_eq!(json["quantity_limit"], 3);

        let back: CollaborationRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_involves_covers_creator_assignee_and_participants() {
        let mut task = draft();
        let assignee = Uuid::new_v4();
        let participant = Uuid::new_v4();
        task.assignee_id = Some(assignee);
        task.set_participants([participant]);

        assert!(task.involves(task.creator_id));
        assert!(task.involves(assignee));
        assert!(task.involves(participant));
        assert!(!task.involves(Uuid::new_v4()));
    }
}
