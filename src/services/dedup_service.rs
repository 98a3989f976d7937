//! Dedup marker and daily-counter bookkeeping against the configured store.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::config::{DedupConfig, DedupWindow, COUNTER_TTL_SECONDS};
use crate::store::{KvStore, StoreError, StoreKeys};

#[derive(Debug, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First sighting; the marker is now written.
    Fresh,
    /// Already seen inside the window. Carries the last known daily count,
    /// when the counter is readable.
    Duplicate { count: Option<i64> },
}

#[derive(Clone)]
pub struct DedupService {
    store: Arc<dyn KvStore>,
    window: DedupWindow,
    ttl_seconds: u64,
}

impl DedupService {
    pub fn new(store: Arc<dyn KvStore>, config: &DedupConfig) -> Self {
        Self {
            store,
            window: config.window,
            ttl_seconds: config.ttl_seconds,
        }
    }

    fn dedup_key(&self, event_id: &str, today: NaiveDate) -> String {
        match self.window {
            DedupWindow::CalendarDay => StoreKeys::dedup_daily(today, event_id),
            DedupWindow::RollingTtl => StoreKeys::dedup_rolling(event_id),
        }
    }

    /// Marks the event as seen in a single conditional write. A second call
    /// for the same `event_id` inside the window reports a duplicate.
    pub async fn check_and_mark(
        &self,
        event_id: &str,
        today: NaiveDate,
    ) -> Result<DedupOutcome, StoreError> {
        let key = self.dedup_key(event_id, today);
        let fresh = self.store.set_if_absent(&key, "1", self.ttl_seconds).await?;
        if fresh {
            debug!(event_id, "event marked as seen");
            return Ok(DedupOutcome::Fresh);
        }

        // Duplicate path: the counter is telemetry only, so a read failure
        // here degrades to "count unknown" rather than an error.
        let count = self.current_count(today).await.ok();
        Ok(DedupOutcome::Duplicate { count })
    }

    /// Bumps the daily accepted-event counter and refreshes its expiry.
    pub async fn record_accepted(&self, today: NaiveDate) -> Result<i64, StoreError> {
        let key = StoreKeys::daily_count(today);
        let count = self.store.increment(&key).await?;
        self.store.expire(&key, COUNTER_TTL_SECONDS).await?;
        Ok(count)
    }

    pub async fn current_count(&self, today: NaiveDate) -> Result<i64, StoreError> {
        let value = self.store.get(&StoreKeys::daily_count(today)).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Cheap reachability probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        self.store.get("capi:health:probe").await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(window: DedupWindow) -> DedupService {
        DedupService::new(
            Arc::new(MemoryStore::new()),
            &DedupConfig {
                window,
                ttl_seconds: 86_400,
            },
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
    }

    #[tokio::test]
    async fn first_sighting_is_fresh_then_duplicate() {
        let dedup = service(DedupWindow::CalendarDay);

        assert_eq!(
            dedup.check_and_mark("evt-1", today()).await.unwrap(),
            DedupOutcome::Fresh
        );
        let count = dedup.record_accepted(today()).await.unwrap();
        assert_eq!(count, 1);

        assert_eq!(
            dedup.check_and_mark("evt-1", today()).await.unwrap(),
            DedupOutcome::Duplicate { count: Some(1) }
        );
        // The duplicate did not touch the counter.
        assert_eq!(dedup.current_count(today()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn calendar_day_scoping_resets_on_a_new_date() {
        let dedup = service(DedupWindow::CalendarDay);
        let tomorrow = today().succ_opt().unwrap();

        assert_eq!(
            dedup.check_and_mark("evt-1", today()).await.unwrap(),
            DedupOutcome::Fresh
        );
        assert_eq!(
            dedup.check_and_mark("evt-1", tomorrow).await.unwrap(),
            DedupOutcome::Fresh
        );
    }

    #[tokio::test]
    async fn rolling_window_ignores_the_date() {
        let dedup = service(DedupWindow::RollingTtl);
        let tomorrow = today().succ_opt().unwrap();

        assert_eq!(
            dedup.check_and_mark("evt-1", today()).await.unwrap(),
            DedupOutcome::Fresh
        );
        assert!(matches!(
            dedup.check_and_mark("evt-1", tomorrow).await.unwrap(),
            DedupOutcome::Duplicate { .. }
        ));
    }

    #[tokio::test]
    async fn counter_counts_distinct_events_per_day() {
        let dedup = service(DedupWindow::CalendarDay);
        for i in 0..5 {
            let id = format!("evt-{i}");
            assert_eq!(
                dedup.check_and_mark(&id, today()).await.unwrap(),
                DedupOutcome::Fresh
            );
            dedup.record_accepted(today()).await.unwrap();
        }
        assert_eq!(dedup.current_count(today()).await.unwrap(), 5);
    }
}
