//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Validation of scoring tables and curves

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, PROJECT_DIR};
