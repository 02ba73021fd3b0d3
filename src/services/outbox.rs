//! Ordered persistence queue.
//!
//! Local state changes first; the matching writes are queued here and run
//! one at a time, in order, by a background worker. Transient failures are
//! retried with backoff. A write that still fails is reported through
//! [`SyncEvent::Failed`] followed by [`SyncEvent::ReconcileRequired`], and
//! listeners are expected to reload from storage.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RewardBatch, SprintClock, Task};
use crate::infrastructure::retry::RetryPolicy;

/// A single write against the shared store.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    SaveTask(Box<Task>),
    DeleteTask(Uuid),
    ApplyRewards(RewardBatch),
    SaveSprint(SprintClock),
}

impl PersistCommand {
    pub fn describe(&self) -> String {
        match self {
            Self::SaveTask(task) => format!("save task {}", task.id),
            Self::DeleteTask(id) => format!("delete task {id}"),
            Self::ApplyRewards(batch) => format!("apply rewards {}", batch.key),
            Self::SaveSprint(clock) => format!("save sprint {}", clock.cycle),
        }
    }
}

/// Executes persistence commands.
#[async_trait]
pub trait CommandSink: Send + Sync + 'static {
    async fn execute(&self, command: &PersistCommand) -> DomainResult<()>;
}

/// Progress of queued writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Persisted { command: String },
    Failed { command: String, error: String },
    /// Local state may have diverged from storage
    ReconcileRequired,
}

/// Cloneable producer side of the queue.
#[derive(Debug, Clone)]
pub struct OutboxSender {
    sender: mpsc::UnboundedSender<PersistCommand>,
}

impl OutboxSender {
    pub fn enqueue(&self, command: PersistCommand) -> DomainResult<()> {
        debug!(command = %command.describe(), "queued");
        self.sender.send(command).map_err(|_| DomainError::OutboxClosed)
    }

    pub fn enqueue_all(&self, commands: impl IntoIterator<Item = PersistCommand>) -> DomainResult<()> {
        for command in commands {
            self.enqueue(command)?;
        }
        Ok(())
    }
}

/// Handle to the persistence queue.
pub struct Outbox {
    sender: OutboxSender,
    events: broadcast::Sender<SyncEvent>,
    worker: JoinHandle<()>,
}

impl Outbox {
    /// Start the worker draining the queue into `sink`.
    pub fn start<S: CommandSink>(sink: S, retry: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let worker = tokio::spawn(run_worker(sink, retry, receiver, events.clone()));
        Self {
            sender: OutboxSender { sender },
            events,
            worker,
        }
    }

    pub fn sender(&self) -> OutboxSender {
        self.sender.clone()
    }

    pub fn enqueue(&self, command: PersistCommand) -> DomainResult<()> {
        self.sender.enqueue(command)
    }

    pub fn enqueue_all(&self, commands: impl IntoIterator<Item = PersistCommand>) -> DomainResult<()> {
        self.sender.enqueue_all(commands)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Stop accepting commands and wait until every queued one ran.
    ///
    /// Clones handed out by [`Outbox::sender`] must be dropped first.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(err) = self.worker.await {
            error!(error = %err, "outbox worker ended abnormally");
        }
    }
}

async fn run_worker<S: CommandSink>(
    sink: S,
    retry: RetryPolicy,
    mut receiver: mpsc::UnboundedReceiver<PersistCommand>,
    events: broadcast::Sender<SyncEvent>,
) {
    while let Some(command) = receiver.recv().await {
        let description = command.describe();
        match retry.execute(|| sink.execute(&command)).await {
            Ok(()) => {
                debug!(command = %description, "persisted");
                let _ = events.send(SyncEvent::Persisted {
                    command: description,
                });
            }
            Err(err) => {
                error!(command = %description, error = %err, "persistence failed, reconcile required");
                let _ = events.send(SyncEvent::Failed {
                    command: description,
                    error: err.to_string(),
                });
                let _ = events.send(SyncEvent::ReconcileRequired);
            }
        }
    }
    info!("outbox drained");
}
