//! Domain layer for the squadforge reward engine
//!
//! This module contains core business models, errors and the ports that
//! persistence adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, GradingError};
