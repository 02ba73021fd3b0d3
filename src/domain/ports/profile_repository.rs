use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Member, ProgressionProfile, RewardBatch};

/// Repository interface for members and their progression profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn save_member(&self, member: &Member) -> DomainResult<()>;

    async fn get_member(&self, id: Uuid) -> DomainResult<Option<Member>>;

    async fn list_members(&self) -> DomainResult<Vec<Member>>;

    async fn get_profile(&self, member_id: Uuid) -> DomainResult<Option<ProgressionProfile>>;

    async fn save_profile(&self, profile: &ProgressionProfile) -> DomainResult<()>;

    async fn list_profiles(&self) -> DomainResult<Vec<ProgressionProfile>>;

    /// Apply every award of the batch inside one transaction.
    ///
    /// Profiles are created on first participation. An award whose
    /// (batch key, participant) pair was already applied is skipped, so
    /// replaying a batch leaves profiles unchanged. Returns the profiles
    /// as they stand after the batch.
    async fn apply_rewards(&self, batch: &RewardBatch) -> DomainResult<Vec<ProgressionProfile>>;
}
