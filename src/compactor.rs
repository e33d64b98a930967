use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::observability;
use crate::store::MemoryStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Compact the store's WAL once `threshold` appends have piled up since the
/// last compaction.
pub async fn compact_if_needed(store: &MemoryStore, threshold: u64) -> bool {
    if !store.is_durable() {
        return false;
    }
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => {
            metrics::counter!(observability::COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            info!("WAL compacted after {appends} appends");
            true
        }
        Err(e) => {
            metrics::counter!(observability::COMPACTIONS_TOTAL, "status" => "error").increment(1);
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that checks for compaction every minute.
pub async fn run_compactor(store: Arc<MemoryStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&store, threshold).await;
    }
}
