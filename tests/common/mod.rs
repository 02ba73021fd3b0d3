//! Common test utilities for integration tests
//!
//! Builds an in-memory board with one squad, a master, a mentor, two
//! executors and a level-1 project building.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use squadforge::adapters::sqlite::{
    create_migrated_test_pool, SqliteAppStateRepository, SqliteBuildingRepository,
    SqliteProfileRepository, SqliteSquadRepository, SqliteTaskRepository,
};
use squadforge::domain::models::{Building, BuildingKind, Config, Member, Role, Squad};
use squadforge::domain::ports::ChangeFeed;
use squadforge::services::{ProgressionEngine, Repositories};

pub struct Fixture {
    pub pool: SqlitePool,
    pub repos: Repositories,
    pub config: Config,
    pub squad: Squad,
    pub master: Member,
    pub mentor: Member,
    pub alice: Member,
    pub bob: Member,
    pub project: Building,
}

pub fn repositories(pool: &SqlitePool, config: &Config, feed: Option<Arc<dyn ChangeFeed>>) -> Repositories {
    Repositories {
        tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
        buildings: Arc::new(SqliteBuildingRepository::new(pool.clone())),
        profiles: Arc::new(SqliteProfileRepository::new(
            pool.clone(),
            ProgressionEngine::new(config.progression.clone()),
        )),
        squads: Arc::new(SqliteSquadRepository::new(pool.clone())),
        app_state: Arc::new(SqliteAppStateRepository::new(pool.clone())),
        feed,
    }
}

/// Config with a fast retry policy for tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.sync.initial_backoff_ms = 1;
    config.sync.max_backoff_ms = 5;
    config.sync.debounce_ms = 20;
    config
}

pub async fn fixture() -> Fixture {
    fixture_with_feed(None).await
}

pub async fn fixture_with_feed(feed: Option<Arc<dyn ChangeFeed>>) -> Fixture {
    let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
    let config = test_config();
    let repos = repositories(&pool, &config, feed);

    let squad = Squad::new("Forge", "#f97316");
    repos.squads.save(&squad).await.expect("save squad");

    let master = Member::new("Morgan", Role::Master);
    let mentor = Member::new("Mira", Role::Mentor).with_squad(squad.id);
    let alice = Member::new("Alice", Role::Executor).with_squad(squad.id);
    let bob = Member::new("Bob", Role::Executor).with_squad(squad.id);
    for member in [&master, &mentor, &alice, &bob] {
        repos.profiles.save_member(member).await.expect("save member");
    }

    let project = Building::new("Platform", BuildingKind::Project, master.id).with_squad(squad.id);
    repos.buildings.save(&project).await.expect("save building");

    Fixture {
        pool,
        repos,
        config,
        squad,
        master,
        mentor,
        alice,
        bob,
        project,
    }
}

/// Poll an async predicate every 10ms until it holds or the timeout passes.
pub async fn eventually<F, Fut>(mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
