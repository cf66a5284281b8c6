use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::storage::Store;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the store whenever enough records have piled up since the last
/// compaction. Runs for the life of the tenant.
pub async fn run_compactor(store: Arc<Store>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// Returns whether a compaction ran.
pub async fn compact_if_due(store: &Store, threshold: u64) -> bool {
    let stats = store.journal_stats().await;
    if stats.appends < threshold {
        debug!("compaction skipped: {} appends below {threshold}", stats.appends);
        return false;
    }
    match store.compact().await {
        Ok(written) => {
            info!(
                "compacted {} appends ({} bytes) into {written} records",
                stats.appends, stats.bytes
            );
            true
        }
        Err(e) => {
            warn!("compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("courtbook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let store = Store::open(&path).unwrap();
        let club = Ulid::new();
        store.create_default_schedule(club).await.unwrap();
        for day in 0..7 {
            store.set_daily_hours(club, DailyHours::closed(day)).await.unwrap();
        }

        assert!(!compact_if_due(&store, 100).await);
        assert_eq!(store.journal_stats().await.appends, 8);

        assert!(compact_if_due(&store, 8).await);
        assert_eq!(store.journal_stats().await.appends, 0);

        drop(store);
        let reopened = Store::open(&path).unwrap();
        let schedule = crate::engine::ScheduleStore::schedule_for_club(&reopened, club)
            .await
            .unwrap()
            .unwrap();
        assert!(schedule.weekly_hours.iter().all(|h| !h.is_open));
    }
}
