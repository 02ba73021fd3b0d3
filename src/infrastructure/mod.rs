//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Retry policy for persistence writes

pub mod config;
pub mod logging;
pub mod retry;

pub use retry::RetryPolicy;
