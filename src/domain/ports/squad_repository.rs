use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Squad;

#[async_trait]
pub trait SquadRepository: Send + Sync {
    async fn save(&self, squad: &Squad) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Squad>>;

    async fn list(&self) -> DomainResult<Vec<Squad>>;
}
