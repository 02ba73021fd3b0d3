//! Adapters for persistence and change notification.

pub mod change_feed;
pub mod sqlite;

pub use change_feed::BroadcastChangeFeed;
