//! SQLite implementation of the BuildingRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Building, BuildingKind};
use crate::domain::ports::BuildingRepository;

#[derive(Clone)]
pub struct SqliteBuildingRepository {
    pool: SqlitePool,
}

impl SqliteBuildingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildingRepository for SqliteBuildingRepository {
    async fn save(&self, building: &Building) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO buildings (id, name, kind, owner_id, squad_id, level, description, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   kind = excluded.kind,
                   owner_id = excluded.owner_id,
                   squad_id = excluded.squad_id,
                   level = excluded.level,
                   description = excluded.description"#,
        )
        .bind(building.id.to_string())
        .bind(&building.name)
        .bind(building.kind.as_str())
        .bind(building.owner_id.to_string())
        .bind(building.squad_id.map(|id| id.to_string()))
        .bind(i64::from(building.level))
        .bind(&building.description)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Building>> {
        let row: Option<BuildingRow> = sqlx::query_as("SELECT * FROM buildings WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Building::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM buildings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::BuildingNotFound(id));
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Building>> {
        let rows: Vec<BuildingRow> = sqlx::query_as("SELECT * FROM buildings ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Building::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct BuildingRow {
    id: String,
    name: String,
    kind: String,
    owner_id: String,
    squad_id: Option<String>,
    level: i64,
    description: Option<String>,
}

impl TryFrom<BuildingRow> for Building {
    type Error = DomainError;

    fn try_from(row: BuildingRow) -> Result<Self, Self::Error> {
        let kind = BuildingKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid building kind: {}", row.kind)))?;
        let level = u32::try_from(row.level)
            .map_err(|_| DomainError::SerializationError(format!("Invalid level: {}", row.level)))?;

        Ok(Building {
            id: parse_uuid(&row.id)?,
            name: row.name,
            kind,
            owner_id: parse_uuid(&row.owner_id)?,
            squad_id: parse_optional_uuid(row.squad_id)?,
            level,
            description: row.description,
            tasks: Vec::new(),
        })
    }
}
