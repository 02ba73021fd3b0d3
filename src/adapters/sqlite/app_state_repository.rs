use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::SprintClock;
use crate::domain::ports::AppStateRepository;

const SPRINT_KEY: &str = "sprint";

/// Key/value store for global state; values are JSON.
#[derive(Clone)]
pub struct SqliteAppStateRepository {
    pool: SqlitePool,
}

impl SqliteAppStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppStateRepository for SqliteAppStateRepository {
    async fn get_sprint(&self) -> DomainResult<Option<SprintClock>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
            .bind(SPRINT_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| serde_json::from_str(&value)).transpose()?)
    }

    async fn save_sprint(&self, clock: &SprintClock) -> DomainResult<()> {
        let value = serde_json::to_string(clock)?;
        sqlx::query(
            r#"INSERT INTO app_state (key, value, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(SPRINT_KEY)
        .bind(&value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn test_last_write_wins() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteAppStateRepository::new(pool);
        assert!(repo.get_sprint().await.unwrap().is_none());

        let mut clock = SprintClock::new(Utc::now());
        repo.save_sprint(&clock).await.unwrap();
        clock.cycle = 4;
        repo.save_sprint(&clock).await.unwrap();

        assert_eq!(repo.get_sprint().await.unwrap(), Some(clock));
    }
}
