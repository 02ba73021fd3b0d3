//! Debounced change-notification consumer.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ports::ChangeNotice;

/// Which notices a session cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// Every change (masters see the whole organization)
    All,
    /// One squad plus the global tables
    Squad(Uuid),
}

impl ChangeScope {
    pub fn matches(&self, notice: &ChangeNotice) -> bool {
        match self {
            Self::All => true,
            Self::Squad(squad_id) => {
                notice.table.is_global()
                    || notice.squad_id.is_none()
                    || notice.squad_id == Some(*squad_id)
            }
        }
    }
}

/// Why a reload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    RemoteChange,
    Reconcile,
}

/// Collapse bursts of matching notices into single reload requests.
///
/// After the first matching notice, further notices arriving within
/// `window` are absorbed and one [`ReloadReason::RemoteChange`] is sent
/// when the window closes. The task ends when either channel closes.
pub fn spawn_change_sync(
    mut notices: broadcast::Receiver<ChangeNotice>,
    scope: ChangeScope,
    window: Duration,
    reloads: mpsc::Sender<ReloadReason>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) if scope.matches(&notice) => {}
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged, forcing reload");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }

            let deadline = Instant::now() + window;
            let mut absorbed = 0_u32;
            let mut closed = false;
            loop {
                tokio::select! {
                    () = sleep_until(deadline) => break,
                    next = notices.recv() => match next {
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => absorbed += 1,
                        Err(broadcast::error::RecvError::Closed) => {
                            closed = true;
                            break;
                        }
                    },
                }
            }

            debug!(absorbed, "change burst coalesced");
            if reloads.send(ReloadReason::RemoteChange).await.is_err() || closed {
                break;
            }
        }
    })
}
