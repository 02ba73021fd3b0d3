use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Building;

/// Repository interface for buildings. Returned buildings carry no tasks;
/// callers attach them from the [`TaskRepository`](super::TaskRepository).
#[async_trait]
pub trait BuildingRepository: Send + Sync {
    async fn save(&self, building: &Building) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Building>>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<Building>>;
}
