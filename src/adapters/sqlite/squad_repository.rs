use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_uuid;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Squad;
use crate::domain::ports::SquadRepository;

#[derive(Clone)]
pub struct SqliteSquadRepository {
    pool: SqlitePool,
}

impl SqliteSquadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SquadRepository for SqliteSquadRepository {
    async fn save(&self, squad: &Squad) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO squads (id, name, color, description) VALUES (?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   color = excluded.color,
                   description = excluded.description"#,
        )
        .bind(squad.id.to_string())
        .bind(&squad.name)
        .bind(&squad.color)
        .bind(&squad.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Squad>> {
        let row: Option<SquadRow> = sqlx::query_as("SELECT * FROM squads WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Squad::try_from).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<Squad>> {
        let rows: Vec<SquadRow> = sqlx::query_as("SELECT * FROM squads ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Squad::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SquadRow {
    id: String,
    name: String,
    color: String,
    description: Option<String>,
}

impl TryFrom<SquadRow> for Squad {
    type Error = DomainError;

    fn try_from(row: SquadRow) -> Result<Self, Self::Error> {
        Ok(Squad {
            id: parse_uuid(&row.id)?,
            name: row.name,
            color: row.color,
            description: row.description,
        })
    }
}
