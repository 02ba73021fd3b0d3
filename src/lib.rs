//! Squadforge - gamified work tracking
//!
//! Tasks on project buildings are scored from their size, complexity and
//! collaboration rule, graded by mentors into points, experience and coins,
//! bounded by building capacity, and, for routines, cycled until a renewal
//! decision is due.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and repository ports
//! - **Service Layer** (`services`): scoring, grading, recurrence, progression,
//!   reporting and the board session
//! - **Adapters** (`adapters`): `SQLite` repositories and the change feed
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, retry
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult, GradingError};
pub use domain::models::{Building, BuildingKind, Config, Member, Role, Task, TaskStatus};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BoardService, BoardSession, GradingWorkflow};
