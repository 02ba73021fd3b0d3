//! SQLite implementation of the TaskRepository.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_optional_uuid, parse_uuid, to_i64, to_u64};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CollaborationRule, HistoryEntry, Task, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn save(&self, task: &Task) -> DomainResult<()> {
        let rule_json = serde_json::to_string(&task.rule)?;
        let participants_json = serde_json::to_string(&task.participants)?;
        let history_json = serde_json::to_string(&task.history)?;
        let sprints_json = serde_json::to_string(&task.sprint_history)?;

        sqlx::query(
            r#"INSERT INTO tasks (id, building_id, squad_id, creator_id, assignee_id, content,
               description, status, size, complexity, rule_kind, rule, rule_multiplier,
               participants, evidence_link, delivery_notes, reflections, aim, feedback,
               final_pa, final_xp, final_coins, history, sprint_history, version,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   building_id = excluded.building_id,
                   squad_id = excluded.squad_id,
                   assignee_id = excluded.assignee_id,
                   content = excluded.content,
                   description = excluded.description,
                   status = excluded.status,
                   size = excluded.size,
                   complexity = excluded.complexity,
                   rule_kind = excluded.rule_kind,
                   rule = excluded.rule,
                   rule_multiplier = excluded.rule_multiplier,
                   participants = excluded.participants,
                   evidence_link = excluded.evidence_link,
                   delivery_notes = excluded.delivery_notes,
                   reflections = excluded.reflections,
                   aim = excluded.aim,
                   feedback = excluded.feedback,
                   final_pa = excluded.final_pa,
                   final_xp = excluded.final_xp,
                   final_coins = excluded.final_coins,
                   history = excluded.history,
                   sprint_history = excluded.sprint_history,
                   version = excluded.version,
                   updated_at = excluded.updated_at"#,
        )
        .bind(task.id.to_string())
        .bind(task.building_id.to_string())
        .bind(task.squad_id.map(|id| id.to_string()))
        .bind(task.creator_id.to_string())
        .bind(task.assignee_id.map(|id| id.to_string()))
        .bind(&task.content)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(i64::from(task.size))
        .bind(i64::from(task.complexity))
        .bind(task.rule_kind().as_str())
        .bind(&rule_json)
        .bind(task.rule_multiplier)
        .bind(&participants_json)
        .bind(&task.evidence_link)
        .bind(&task.delivery_notes)
        .bind(&task.reflections)
        .bind(task.aim.map(i64::from))
        .bind(&task.feedback)
        .bind(task.final_pa.map(to_i64))
        .bind(task.final_xp.map(to_i64))
        .bind(task.final_coins.map(to_i64))
        .bind(&history_json)
        .bind(&sprints_json)
        .bind(to_i64(task.version))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }

        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(building_id) = filter.building_id {
            query.push_str(" AND building_id = ?");
            bindings.push(building_id.to_string());
        }
        if let Some(squad_id) = filter.squad_id {
            query.push_str(" AND squad_id = ?");
            bindings.push(squad_id.to_string());
        }
        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        query.push_str(" ORDER BY created_at, rowid");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Task::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    building_id: String,
    squad_id: Option<String>,
    creator_id: String,
    assignee_id: Option<String>,
    content: String,
    description: Option<String>,
    status: String,
    size: i64,
    complexity: i64,
    rule: String,
    rule_multiplier: f64,
    participants: String,
    evidence_link: Option<String>,
    delivery_notes: Option<String>,
    reflections: Option<String>,
    aim: Option<i64>,
    feedback: Option<String>,
    final_pa: Option<i64>,
    final_xp: Option<i64>,
    final_coins: Option<i64>,
    history: String,
    sprint_history: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;
        let size = u32::try_from(row.size)
            .map_err(|_| DomainError::SerializationError(format!("Invalid size: {}", row.size)))?;
        let complexity = u8::try_from(row.complexity).map_err(|_| {
            DomainError::SerializationError(format!("Invalid complexity: {}", row.complexity))
        })?;
        let aim = row
            .aim
            .map(u8::try_from)
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        let rule: CollaborationRule = serde_json::from_str(&row.rule)?;
        let participants: Vec<Uuid> = serde_json::from_str(&row.participants)?;
        let history: Vec<HistoryEntry> = serde_json::from_str(&row.history)?;
        let sprint_history: BTreeSet<u32> = serde_json::from_str(&row.sprint_history)?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            building_id: parse_uuid(&row.building_id)?,
            squad_id: parse_optional_uuid(row.squad_id)?,
            creator_id: parse_uuid(&row.creator_id)?,
            assignee_id: parse_optional_uuid(row.assignee_id)?,
            content: row.content,
            description: row.description,
            status,
            size,
            complexity,
            rule,
            rule_multiplier: row.rule_multiplier,
            participants,
            evidence_link: row.evidence_link,
            delivery_notes: row.delivery_notes,
            reflections: row.reflections,
            aim,
            feedback: row.feedback,
            final_pa: row.final_pa.map(to_u64),
            final_xp: row.final_xp.map(to_u64),
            final_coins: row.final_coins.map(to_u64),
            history,
            sprint_history,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            version: to_u64(row.version),
        })
    }
}
