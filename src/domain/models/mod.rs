pub mod building;
pub mod config;
pub mod profile;
pub mod reward;
pub mod sprint;
pub mod task;

pub use building::{Building, BuildingKind};
pub use config::{
    AimOption, CapacityConfig, Config, DatabaseConfig, GuildBand, LevelCeiling, LevelCurve,
    LoggingConfig, ProgressionConfig, RuleMultipliers, ScoringConfig, SprintConfig, SyncConfig,
};
pub use profile::{Member, ProgressionProfile, Role, Squad, TeamProgression};
pub use reward::RewardBatch;
pub use sprint::SprintClock;
pub use task::{
    CollaborationRule, HistoryEntry, ParticipantAward, Recurrence, RecurrenceMode, RenewalTrigger,
    RuleKind, Task, TaskStatus, COMPLEXITY_RANGE, FIBONACCI_SIZES,
};
