//! Short ID prefix resolution for CLI commands.
//!
//! Allows users to specify any unique prefix of a UUID instead of the full ID,
//! similar to git short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Entities addressable by ID prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    Building,
    Member,
    Squad,
}

impl Entity {
    fn name(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Building => "building",
            Self::Member => "member",
            Self::Squad => "squad",
        }
    }

    fn query(self) -> &'static str {
        match self {
            Self::Task => "SELECT id FROM tasks WHERE id LIKE ?",
            Self::Building => "SELECT id FROM buildings WHERE id LIKE ?",
            Self::Member => "SELECT id FROM members WHERE id LIKE ?",
            Self::Squad => "SELECT id FROM squads WHERE id LIKE ?",
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}

/// Resolve an ID prefix to the one matching UUID.
pub async fn resolve(pool: &SqlitePool, entity: Entity, prefix: &str) -> Result<Uuid> {
    // Fast path: a full UUID is returned as is
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;

    let pattern = format!("{}%", prefix.to_lowercase());
    let rows: Vec<(String,)> = sqlx::query_as(entity.query())
        .bind(&pattern)
        .fetch_all(pool)
        .await?;

    match rows.len() {
        0 => bail!("No {} found matching '{}'", entity.name(), prefix),
        1 => Ok(Uuid::parse_str(&rows[0].0)?),
        n => {
            let mut msg = format!("Ambiguous prefix '{}': matches {} {}s:", prefix, n, entity.name());
            for row in &rows {
                msg.push_str(&format!("\n  {}", row.0));
            }
            bail!("{}", msg)
        }
    }
}

pub async fn resolve_optional(pool: &SqlitePool, entity: Entity, prefix: Option<&str>) -> Result<Option<Uuid>> {
    match prefix {
        Some(prefix) => resolve(pool, entity, prefix).await.map(Some),
        None => Ok(None),
    }
}
