//! In-process change feed.
//!
//! Every repository write made through a session publishes here; other
//! sessions in the same process subscribe and reload.

use tokio::sync::broadcast;

use crate::domain::ports::{ChangeFeed, ChangeNotice};

const DEFAULT_CAPACITY: usize = 256;

pub struct BroadcastChangeFeed {
    sender: broadcast::Sender<ChangeNotice>,
}

impl BroadcastChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed for BroadcastChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.sender.subscribe()
    }

    fn publish(&self, notice: ChangeNotice) {
        // No subscribers is fine
        if self.sender.send(notice).is_err() {
            tracing::trace!(table = %notice.table, "Change notice dropped, no subscribers");
        }
    }
}
