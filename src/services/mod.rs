pub mod board;
pub mod capacity;
pub mod change_sync;
pub mod distribution;
pub mod grading;
pub mod outbox;
pub mod progression;
pub mod recurrence;
pub mod reporting;
pub mod scoring;
pub mod session;

pub use board::{BoardService, BoardState, Mutation, NewTask, RuleChoice, TaskUpdate};
pub use capacity::{CapacityDecision, CapacityGuard};
pub use change_sync::{spawn_change_sync, ChangeScope, ReloadReason};
pub use grading::{GradeRequest, GradingPlan, GradingWorkflow};
pub use outbox::{CommandSink, Outbox, OutboxSender, PersistCommand, SyncEvent};
pub use progression::{GuildProgress, ProgressionEngine};
pub use recurrence::{CycleOutcome, RecurrenceManager, RenewalDecision};
pub use reporting::{AggregationReporter, PeriodFilter};
pub use scoring::{compute_base_points, task_points, AimScale};
pub use session::{BoardSession, Repositories};
