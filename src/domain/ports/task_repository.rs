use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub building_id: Option<Uuid>,
    pub squad_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

/// Repository interface for Task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert or replace a task.
    async fn save(&self, task: &Task) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List tasks matching the filter, oldest first.
    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;
}
