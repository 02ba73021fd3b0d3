//! CLI command implementations.

pub mod building;
pub mod init;
pub mod member;
pub mod report;
pub mod sprint;
pub mod squad;
pub mod task;
