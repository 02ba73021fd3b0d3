//! A running board session.
//!
//! Owns the [`BoardState`], applies every mutation in memory first, queues
//! the resulting writes on the [`Outbox`] and keeps the state in step with
//! storage: a sprint ticker, a debounced change-feed consumer and a reload
//! loop that also answers reconcile requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Building, Config, Role, SprintClock};
use crate::domain::ports::{
    AppStateRepository, BuildingRepository, ChangeFeed, ChangeNotice, ChangeTable,
    ProfileRepository, SquadRepository, TaskFilter, TaskRepository,
};
use crate::infrastructure::retry::RetryPolicy;
use crate::services::board::{BoardService, BoardState, Mutation};
use crate::services::change_sync::{spawn_change_sync, ChangeScope, ReloadReason};
use crate::services::outbox::{CommandSink, Outbox, PersistCommand, SyncEvent};

/// The persistence ports a session works against.
#[derive(Clone)]
pub struct Repositories {
    pub tasks: Arc<dyn TaskRepository>,
    pub buildings: Arc<dyn BuildingRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub squads: Arc<dyn SquadRepository>,
    pub app_state: Arc<dyn AppStateRepository>,
    /// Notified after each successful write
    pub feed: Option<Arc<dyn ChangeFeed>>,
}

impl Repositories {
    fn notify(&self, notice: ChangeNotice) {
        if let Some(feed) = &self.feed {
            feed.publish(notice);
        }
    }
}

#[async_trait]
impl CommandSink for Repositories {
    async fn execute(&self, command: &PersistCommand) -> DomainResult<()> {
        let notice = match command {
            PersistCommand::SaveTask(task) => {
                self.tasks.save(task).await?;
                ChangeNotice::new(ChangeTable::Tasks, task.squad_id)
            }
            PersistCommand::DeleteTask(id) => {
                self.tasks.delete(*id).await?;
                ChangeNotice::new(ChangeTable::Tasks, None)
            }
            PersistCommand::ApplyRewards(batch) => {
                self.profiles.apply_rewards(batch).await?;
                ChangeNotice::new(ChangeTable::Profiles, None)
            }
            PersistCommand::SaveSprint(clock) => {
                self.app_state.save_sprint(clock).await?;
                ChangeNotice::new(ChangeTable::AppState, None)
            }
        };
        self.notify(notice);
        Ok(())
    }
}

/// Load the whole board from storage.
///
/// A missing sprint clock is started at the current time and saved.
pub async fn load_state(
    repos: &Repositories,
    service: &BoardService,
    actor_id: Option<Uuid>,
) -> DomainResult<BoardState> {
    let (mut buildings, tasks, squads, members, sprint) = futures::try_join!(
        repos.buildings.list(),
        repos.tasks.list(TaskFilter::default()),
        repos.squads.list(),
        repos.profiles.list_members(),
        repos.app_state.get_sprint(),
    )?;

    let sprint = match sprint {
        Some(clock) => clock,
        None => {
            let clock = SprintClock::new(Utc::now());
            repos.app_state.save_sprint(&clock).await?;
            clock
        }
    };

    for task in tasks {
        if let Some(building) = buildings.iter_mut().find(|b| b.id == task.building_id) {
            building.tasks.push(task);
        } else {
            warn!(task_id = %task.id, building_id = %task.building_id, "task without building skipped");
        }
    }

    let mut state = BoardState::new(sprint);
    state.buildings = buildings;
    state.squads = squads;

    if let Some(actor_id) = actor_id {
        let actor = members
            .iter()
            .find(|m| m.id == actor_id)
            .cloned()
            .ok_or(DomainError::MemberNotFound(actor_id))?;
        let profile = repos
            .profiles
            .get_profile(actor_id)
            .await?
            .unwrap_or_else(|| service.progression().new_profile(actor_id));
        state.actor = Some(actor);
        state.profile = Some(profile);
    }
    state.members = members;

    debug!(
        buildings = state.buildings.len(),
        members = state.members.len(),
        sprint = state.sprint.cycle,
        "board loaded"
    );
    Ok(state)
}

pub struct BoardSession {
    state: Arc<Mutex<BoardState>>,
    service: Arc<BoardService>,
    repos: Repositories,
    actor_id: Option<Uuid>,
    scope: ChangeScope,
    outbox: Outbox,
    background: Vec<JoinHandle<()>>,
}

impl BoardSession {
    /// Load the board and start the persistence worker. Elapsed sprints are
    /// caught up right away.
    pub async fn open(config: Config, repos: Repositories, actor_id: Option<Uuid>) -> DomainResult<Self> {
        let service = Arc::new(BoardService::new(config));
        let state = load_state(&repos, &service, actor_id).await?;
        let scope = scope_for(&state);
        let outbox = Outbox::start(repos.clone(), RetryPolicy::from_config(&service.config().sync));

        let session = Self {
            state: Arc::new(Mutex::new(state)),
            service,
            repos,
            actor_id,
            scope,
            outbox,
            background: Vec::new(),
        };
        session
            .execute(|service, state| Ok(service.advance_sprint(state, Utc::now())))
            .await?;
        Ok(session)
    }

    pub fn service(&self) -> &BoardService {
        &self.service
    }

    /// Run a mutation and queue its writes.
    pub async fn execute<T, F>(&self, operation: F) -> DomainResult<T>
    where
        F: FnOnce(&BoardService, &mut BoardState) -> DomainResult<Mutation<T>>,
    {
        let mut state = self.state.lock().await;
        let Mutation { value, commands } = operation(self.service.as_ref(), &mut *state)?;
        self.outbox.enqueue_all(commands)?;
        Ok(value)
    }

    /// Read from the current state.
    pub async fn read<T, F>(&self, reader: F) -> T
    where
        F: FnOnce(&BoardService, &BoardState) -> T,
    {
        let state = self.state.lock().await;
        reader(self.service.as_ref(), &*state)
    }

    pub async fn snapshot(&self) -> BoardState {
        self.state.lock().await.clone()
    }

    pub fn subscribe_sync(&self) -> broadcast::Receiver<SyncEvent> {
        self.outbox.subscribe()
    }

    /// Replace local state with what storage holds.
    pub async fn reload(&self) -> DomainResult<()> {
        reload_into(&self.state, &self.repos, &self.service, self.actor_id).await
    }

    /// Start the sprint ticker, change-feed consumer and reload loop.
    pub fn start_background(&mut self, feed: Option<Arc<dyn ChangeFeed>>) {
        let (reload_tx, reload_rx) = mpsc::channel(16);

        self.background.push(self.spawn_sprint_ticker());
        self.background.push(spawn_reconcile_forwarder(self.outbox.subscribe(), reload_tx.clone()));

        if let Some(feed) = feed {
            let scope = self.scope;
            let window = Duration::from_millis(self.service.config().sync.debounce_ms);
            self.background
                .push(spawn_change_sync(feed.subscribe(), scope, window, reload_tx));
        }

        let state = Arc::clone(&self.state);
        let repos = self.repos.clone();
        let service = Arc::clone(&self.service);
        let actor_id = self.actor_id;
        self.background.push(tokio::spawn(async move {
            let mut reload_rx = reload_rx;
            while let Some(reason) = reload_rx.recv().await {
                info!(?reason, "reloading board");
                if let Err(err) = reload_into(&state, &repos, &service, actor_id).await {
                    warn!(error = %err, "board reload failed");
                }
            }
        }));
    }

    fn spawn_sprint_ticker(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let service = Arc::clone(&self.service);
        let sender = self.outbox.sender();
        let period = Duration::from_secs(service.config().sprint.check_interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let mut state = state.lock().await;
                let mutation = service.advance_sprint(&mut state, Utc::now());
                if let Err(err) = sender.enqueue_all(mutation.commands) {
                    warn!(error = %err, "sprint ticker stopped");
                    break;
                }
            }
        })
    }

    /// Stop background work and flush every queued write.
    pub async fn shutdown(self) {
        for handle in &self.background {
            handle.abort();
        }
        for handle in self.background {
            let _ = handle.await;
        }
        self.outbox.close().await;
        debug!("session closed");
    }
}

/// Masters follow the whole organization, everyone else their own squad.
fn scope_for(state: &BoardState) -> ChangeScope {
    match &state.actor {
        Some(actor) if actor.role != Role::Master => {
            actor.squad_id.map_or(ChangeScope::All, ChangeScope::Squad)
        }
        _ => ChangeScope::All,
    }
}

fn spawn_reconcile_forwarder(
    mut events: broadcast::Receiver<SyncEvent>,
    reloads: mpsc::Sender<ReloadReason>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SyncEvent::ReconcileRequired) => {
                    if reloads.send(ReloadReason::Reconcile).await.is_err() {
                        break;
                    }
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn reload_into(
    state: &Mutex<BoardState>,
    repos: &Repositories,
    service: &BoardService,
    actor_id: Option<Uuid>,
) -> DomainResult<()> {
    let fresh = load_state(repos, service, actor_id).await?;
    *state.lock().await = fresh;
    Ok(())
}

/// Attach a building's tasks from storage.
pub async fn load_building(repos: &Repositories, id: Uuid) -> DomainResult<Building> {
    let mut building = repos
        .buildings
        .get(id)
        .await?
        .ok_or(DomainError::BuildingNotFound(id))?;
    building.tasks = repos
        .tasks
        .list(TaskFilter {
            building_id: Some(id),
            ..TaskFilter::default()
        })
        .await?;
    Ok(building)
}
