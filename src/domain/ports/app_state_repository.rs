use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::SprintClock;

/// Global singleton state shared by every session.
#[async_trait]
pub trait AppStateRepository: Send + Sync {
    async fn get_sprint(&self) -> DomainResult<Option<SprintClock>>;

    /// Last write wins.
    async fn save_sprint(&self, clock: &SprintClock) -> DomainResult<()>;
}
