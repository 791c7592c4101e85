use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::services::store::SnapshotStore;

/// Periodically evicts snapshots whose retention TTL has lapsed.
pub struct PurgeScheduler {
    store: Arc<SnapshotStore>,
    interval: Duration,
}

impl PurgeScheduler {
    pub fn new(store: Arc<SnapshotStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Runs the purge sweep forever. Abort the task to stop it.
    pub async fn start(self) {
        info!("Starting cache purge scheduler (interval: {:?})", self.interval);

        loop {
            // wait first, a fresh store has nothing to purge
            tokio::time::sleep(self.interval).await;
            self.run_purge().await;
        }
    }

    async fn run_purge(&self) -> usize {
        let evicted = self.store.purge_expired(Utc::now()).await;
        if evicted > 0 {
            info!("Cache purge evicted {} snapshot(s), {} remaining", evicted, self.store.len().await);
        } else {
            debug!("Cache purge found nothing to evict");
        }
        evicted
    }
}
