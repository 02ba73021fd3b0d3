use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Table a change notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Tasks,
    Buildings,
    Profiles,
    Squads,
    AppState,
}

impl ChangeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Buildings => "buildings",
            Self::Profiles => "profiles",
            Self::Squads => "squads",
            Self::AppState => "app_state",
        }
    }

    /// Tables every scope listens to regardless of squad.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Squads | Self::AppState)
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse "something changed" event. Receivers reload rather than patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub table: ChangeTable,
    pub squad_id: Option<Uuid>,
}

impl ChangeNotice {
    pub fn new(table: ChangeTable, squad_id: Option<Uuid>) -> Self {
        Self { table, squad_id }
    }
}

/// Source of change notifications from the shared store.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice>;

    fn publish(&self, notice: ChangeNotice);
}
