//! Shared setup for commands: configuration, database and sessions.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::adapters::sqlite::{
    database_url, initialize_database, PoolConfig, SqliteAppStateRepository, SqliteBuildingRepository,
    SqliteProfileRepository, SqliteSquadRepository, SqliteTaskRepository,
};
use crate::cli::id_resolver::{resolve, Entity};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{BoardSession, ProgressionEngine, Repositories, SyncEvent};

/// Everything a command needs to reach the project's data.
pub struct CliContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub repos: Repositories,
}

impl CliContext {
    /// Load configuration and open the project database.
    pub async fn open() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let url = database_url(&config.database.path);
        let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
            .await
            .context("Failed to open database. Run 'squadforge init' first.")?;
        let repos = repositories(pool.clone(), &config);
        Ok(Self { config, pool, repos })
    }

    pub async fn resolve(&self, entity: Entity, prefix: &str) -> Result<Uuid> {
        resolve(&self.pool, entity, prefix).await
    }

    /// Open a board session acting as `actor`.
    pub async fn session(&self, actor: Option<&str>) -> Result<SessionGuard> {
        let actor_id = match actor {
            Some(prefix) => Some(self.resolve(Entity::Member, prefix).await?),
            None => None,
        };
        let session = BoardSession::open(self.config.clone(), self.repos.clone(), actor_id)
            .await
            .context("Failed to load the board")?;
        let events = session.subscribe_sync();
        Ok(SessionGuard { session, events })
    }

    /// Like [`CliContext::session`] but fails without an actor.
    pub async fn acting_session(&self, actor: Option<&str>) -> Result<SessionGuard> {
        if actor.is_none() {
            bail!("This command needs an acting member: pass --actor or set SQUADFORGE_ACTOR");
        }
        self.session(actor).await
    }
}

/// Wire the `SQLite` repositories into a [`Repositories`] bundle.
pub fn repositories(pool: SqlitePool, config: &Config) -> Repositories {
    Repositories {
        tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
        buildings: Arc::new(SqliteBuildingRepository::new(pool.clone())),
        profiles: Arc::new(SqliteProfileRepository::new(
            pool.clone(),
            ProgressionEngine::new(config.progression.clone()),
        )),
        squads: Arc::new(SqliteSquadRepository::new(pool.clone())),
        app_state: Arc::new(SqliteAppStateRepository::new(pool)),
        feed: None,
    }
}

/// A session whose queued writes are flushed and checked by [`SessionGuard::finish`].
pub struct SessionGuard {
    pub session: BoardSession,
    events: broadcast::Receiver<SyncEvent>,
}

impl SessionGuard {
    /// Flush every queued write; fails if any of them could not be persisted.
    pub async fn finish(self) -> Result<()> {
        let Self { session, mut events } = self;
        session.shutdown().await;

        let mut failures = Vec::new();
        loop {
            match events.try_recv() {
                Ok(SyncEvent::Failed { command, error }) => failures.push(format!("{command}: {error}")),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }

        if !failures.is_empty() {
            bail!("Some changes were not saved:\n  {}", failures.join("\n  "));
        }
        Ok(())
    }
}
