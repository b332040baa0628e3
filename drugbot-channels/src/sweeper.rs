//! Background eviction of expired sessions.

use drugbot_dialogue::{Clock, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically drop sessions idle for longer than the store's TTL.
///
/// Lookups already treat expired records as absent; this only bounds memory
/// for users who never come back.
pub fn spawn_session_sweeper(
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let removed = store.evict_expired(clock.now());
            if removed > 0 {
                tracing::info!(
                    removed = removed,
                    remaining = store.len(),
                    "Evicted expired sessions"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use drugbot_dialogue::{DrugCode, ManualClock, Step};

    #[tokio::test]
    async fn test_sweeper_evicts_idle_sessions() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(SessionStore::default());

        store.upsert("U-old", Some(DrugCode::One), Step::AwaitingConfirm, start);
        clock.advance(chrono::Duration::minutes(31));
        store.upsert("U-new", Some(DrugCode::Two), Step::AwaitingConfirm, clock.now());

        let handle = spawn_session_sweeper(store.clone(), clock, Duration::from_millis(10));

        for _ in 0..50 {
            if store.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(store.len(), 1);
        assert!(store.get("U-new").is_some());
        assert!(store.get("U-old").is_none());
    }
}
