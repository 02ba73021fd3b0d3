//! SQLite implementation of the ProfileRepository.
//!
//! Rewards go through `reward_ledger` so a batch is applied at most once
//! per participant, even when the outbox replays a command after a failure.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{parse_optional_uuid, parse_uuid, to_i64, to_u64};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Member, ProgressionProfile, RewardBatch, Role};
use crate::domain::ports::ProfileRepository;
use crate::services::ProgressionEngine;

#[derive(Clone)]
pub struct SqliteProfileRepository {
    pool: SqlitePool,
    engine: ProgressionEngine,
}

impl SqliteProfileRepository {
    pub fn new(pool: SqlitePool, engine: ProgressionEngine) -> Self {
        Self { pool, engine }
    }

    async fn fetch_profile(
        tx: &mut Transaction<'_, Sqlite>,
        member_id: Uuid,
    ) -> DomainResult<Option<ProgressionProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE member_id = ?")
            .bind(member_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
        row.map(ProgressionProfile::try_from).transpose()
    }

    async fn upsert_profile(tx: &mut Transaction<'_, Sqlite>, profile: &ProgressionProfile) -> DomainResult<()> {
        sqlx::query(UPSERT_PROFILE)
            .bind(profile.member_id.to_string())
            .bind(i64::from(profile.level))
            .bind(to_i64(profile.current_xp))
            .bind(to_i64(profile.next_level_xp))
            .bind(to_i64(profile.total_points))
            .bind(to_i64(profile.coins))
            .bind(profile.reputation)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

const UPSERT_PROFILE: &str = r#"INSERT INTO profiles
    (member_id, level, current_xp, next_level_xp, total_points, coins, reputation, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(member_id) DO UPDATE SET
        level = excluded.level,
        current_xp = excluded.current_xp,
        next_level_xp = excluded.next_level_xp,
        total_points = excluded.total_points,
        coins = excluded.coins,
        reputation = excluded.reputation,
        updated_at = excluded.updated_at"#;

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn save_member(&self, member: &Member) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO members (id, name, squad_id, role) VALUES (?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   squad_id = excluded.squad_id,
                   role = excluded.role"#,
        )
        .bind(member.id.to_string())
        .bind(&member.name)
        .bind(member.squad_id.map(|id| id.to_string()))
        .bind(member.role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_member(&self, id: Uuid) -> DomainResult<Option<Member>> {
        let row: Option<MemberRow> = sqlx::query_as("SELECT * FROM members WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Member::try_from).transpose()
    }

    async fn list_members(&self) -> DomainResult<Vec<Member>> {
        let rows: Vec<MemberRow> = sqlx::query_as("SELECT * FROM members ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Member::try_from).collect()
    }

    async fn get_profile(&self, member_id: Uuid) -> DomainResult<Option<ProgressionProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE member_id = ?")
            .bind(member_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ProgressionProfile::try_from).transpose()
    }

    async fn save_profile(&self, profile: &ProgressionProfile) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_profile(&mut tx, profile).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_profiles(&self) -> DomainResult<Vec<ProgressionProfile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as("SELECT * FROM profiles ORDER BY total_points DESC, member_id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ProgressionProfile::try_from).collect()
    }

    async fn apply_rewards(&self, batch: &RewardBatch) -> DomainResult<Vec<ProgressionProfile>> {
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(batch.awards.len());
        let applied_at = Utc::now().to_rfc3339();

        for award in &batch.awards {
            let inserted = sqlx::query(
                r#"INSERT OR IGNORE INTO reward_ledger
                   (batch_key, participant_id, task_id, points, xp, coins, aim, applied_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&batch.key)
            .bind(award.participant_id.to_string())
            .bind(batch.task_id.to_string())
            .bind(to_i64(award.points))
            .bind(to_i64(award.xp))
            .bind(to_i64(award.coins))
            .bind(i64::from(batch.aim))
            .bind(&applied_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            let existing = Self::fetch_profile(&mut tx, award.participant_id).await?;
            if inserted == 0 {
                tracing::debug!(
                    batch = %batch.key,
                    participant = %award.participant_id,
                    "Reward already applied, skipping"
                );
                if let Some(profile) = existing {
                    updated.push(profile);
                }
                continue;
            }

            let mut profile = existing.unwrap_or_else(|| self.engine.new_profile(award.participant_id));
            let change = self
                .engine
                .apply_reward(&mut profile, award.points, award.xp, award.coins, batch.stars);
            if change.leveled_up() {
                tracing::info!(
                    member = %award.participant_id,
                    from = change.from,
                    to = change.to,
                    "Member leveled up"
                );
            }
            Self::upsert_profile(&mut tx, &profile).await?;
            updated.push(profile);
        }

        tx.commit().await?;
        Ok(updated)
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: String,
    name: String,
    squad_id: Option<String>,
    role: String,
}

impl TryFrom<MemberRow> for Member {
    type Error = DomainError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid role: {}", row.role)))?;
        Ok(Member {
            id: parse_uuid(&row.id)?,
            name: row.name,
            squad_id: parse_optional_uuid(row.squad_id)?,
            role,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    member_id: String,
    level: i64,
    current_xp: i64,
    next_level_xp: i64,
    total_points: i64,
    coins: i64,
    reputation: f64,
}

impl TryFrom<ProfileRow> for ProgressionProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let level = u32::try_from(row.level)
            .map_err(|_| DomainError::SerializationError(format!("Invalid level: {}", row.level)))?;
        Ok(ProgressionProfile {
            member_id: parse_uuid(&row.member_id)?,
            level,
            current_xp: to_u64(row.current_xp),
            next_level_xp: to_u64(row.next_level_xp),
            total_points: to_u64(row.total_points),
            coins: to_u64(row.coins),
            reputation: row.reputation,
        })
    }
}
