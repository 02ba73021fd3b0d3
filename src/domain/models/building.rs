//! Building (task container) domain model.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;

/// What a building is used for. Only projects hold tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// A functional project that owns a board of tasks
    Project,
    /// Squad headquarters; aggregates its squad's tasks
    SquadHq,
    /// A member's home; aggregates the member's tasks
    Residential,
    /// Global hub; aggregates everything
    TribalCenter,
}

impl BuildingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::SquadHq => "squad_hq",
            Self::Residential => "residential",
            Self::TribalCenter => "tribal_center",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "project" => Some(Self::Project),
            "squad_hq" | "hq" => Some(Self::SquadHq),
            "residential" | "house" => Some(Self::Residential),
            "tribal_center" | "tribal" => Some(Self::TribalCenter),
            _ => None,
        }
    }

    pub fn accepts_tasks(&self) -> bool {
        matches!(self, Self::Project)
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: Uuid,
    pub name: String,
    pub kind: BuildingKind,
    pub owner_id: Uuid,
    pub squad_id: Option<Uuid>,
    /// Maps to a PA ceiling through configuration
    pub level: u32,
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Building {
    pub fn new(name: impl Into<String>, kind: BuildingKind, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            owner_id,
            squad_id: None,
            level: 1,
            description: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_squad(mut self, squad_id: Uuid) -> Self {
        self.squad_id = Some(squad_id);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn task(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Building name cannot be empty".to_string());
        }
        if self.level == 0 {
            return Err("Building level starts at 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_projects_accept_tasks() {
        assert!(BuildingKind::Project.accepts_tasks());
        assert!(!BuildingKind::SquadHq.accepts_tasks());
        assert!(!BuildingKind::Residential.accepts_tasks());
        assert!(!BuildingKind::TribalCenter.accepts_tasks());
    }

    #[test]
    fn test_task_lookup() {
        let owner = Uuid::new_v4();
        let mut building = Building::new("Dashboard", BuildingKind::Project, owner);
        let task = Task::new("Prototype", building.id, owner);
        let id = task.id;
        building.tasks.push(task);

        assert!(building.task(id).is_some());
        building.task_mut(id).unwrap().size = 8;
        assert_eq!(building.task(id).unwrap().size, 8);
        assert!(building.task(Uuid::new_v4()).is_none());
    }
}
