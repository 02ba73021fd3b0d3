//! Domain errors for the squadforge engine.

use thiserror::Error;
use uuid::Uuid;

use super::models::task::TaskStatus;
use super::models::profile::Role;

/// Typed reasons a grading or renewal request is refused.
///
/// Every variant is produced before any state is touched, so callers can
/// surface the message and let the user correct and retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    #[error("Role {0} is not allowed to grade tasks")]
    Unauthorized(Role),

    #[error("Task must be in review to be graded (current status: {0})")]
    NotInReview(TaskStatus),

    #[error("Point distribution mismatch: shares sum to {actual} but the task is worth {expected} PA")]
    DistributionMismatch { expected: u64, actual: u64 },

    #[error("Storage capacity reached ({current}/{limit} PA, task needs {candidate})")]
    CapacityExceeded { current: u64, candidate: u64, limit: u64 },

    #[error("No participant receives a positive reward")]
    NothingToDistribute,

    #[error("Unknown AIM rating: {0}")]
    UnknownRating(u8),

    #[error("Task {0} is already awaiting a renewal decision")]
    RenewalPending(Uuid),

    #[error("Task {0} has no pending renewal decision")]
    NoRenewalPending(Uuid),

    #[error("Task {0} is a closed routine and cannot cycle again")]
    RoutineClosed(Uuid),
}

/// Domain-level errors that can occur in the squadforge system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Building not found: {0}")]
    BuildingNotFound(Uuid),

    #[error("Member not found: {0}")]
    MemberNotFound(Uuid),

    #[error("Squad not found: {0}")]
    SquadNotFound(Uuid),

    #[error("No member is signed in")]
    NoActiveMember,

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Grading(#[from] GradingError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Persistence queue closed")]
    OutboxClosed,
}

impl DomainError {
    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grading_error_converts_into_domain_error() {
        let err: DomainError = GradingError::NothingToDistribute.into();
        assert!(matches!(err, DomainError::Grading(GradingError::NothingToDistribute)));
        assert_eq!(err.to_string(), "No participant receives a positive reward");
    }

    #[test]
    fn test_only_database_errors_are_transient() {
        assert!(DomainError::DatabaseError("locked".into()).is_transient());
        assert!(!DomainError::ValidationFailed("bad".into()).is_transient());
        assert!(!DomainError::from(GradingError::UnknownRating(9)).is_transient());
    }

    #[test]
    fn test_capacity_message_reports_current_and_limit() {
        let err = GradingError::CapacityExceeded { current: 95, candidate: 10, limit: 100 };
        assert_eq!(
            err.to_string(),
            "Storage capacity reached (95/100 PA, task needs 10)"
        );
    }
}
