//! Port trait definitions (Hexagonal Architecture)
//!
//! Async traits the persistence adapters implement:
//! - TaskRepository / BuildingRepository: boards and their tasks
//! - ProfileRepository: members, progression profiles and atomic reward batches
//! - SquadRepository: squads
//! - AppStateRepository: the global sprint clock
//! - ChangeFeed: coarse change notifications

pub mod app_state_repository;
pub mod building_repository;
pub mod change_feed;
pub mod profile_repository;
pub mod squad_repository;
pub mod task_repository;

pub use app_state_repository::AppStateRepository;
pub use building_repository::BuildingRepository;
pub use change_feed::{ChangeFeed, ChangeNotice, ChangeTable};
pub use profile_repository::ProfileRepository;
pub use squad_repository::SquadRepository;
pub use task_repository::{TaskFilter, TaskRepository};
