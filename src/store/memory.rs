//! In-process store backend backed by a concurrent map.
//!
//! Useful for tests and single-instance deployments where an external store
//! is overkill. Entries carry their own expiry; a background task sweeps
//! expired entries once a minute so the map does not grow without bound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::interval;
use tracing::debug;

use super::{KvStore, StoreError};

#[derive(Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
}

impl MemoryStore {
    /// Creates the store and spawns the expiry sweeper. Must be called from
    /// within a tokio runtime.
    pub fn new() -> Self {
        let entries: Arc<DashMap<String, StoredValue>> = Arc::new(DashMap::new());

        let sweep = entries.clone();
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(60));
            loop {
                tick.tick().await;
                let before = sweep.len();
                let now = Instant::now();
                sweep.retain(|_, v| !v.is_expired(now));
                if sweep.len() < before {
                    debug!("memory store swept {} expired entries", before - sweep.len());
                }
            }
        });

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if hit.is_none() {
            // Expired entry observed; drop it eagerly rather than waiting for
            // the sweeper.
            self.entries.remove(key);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StoreError> {
        let ttl = ttl_seconds.map(Duration::from_secs);
        self.entries
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let ttl = Some(Duration::from_secs(ttl_seconds));
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::new("1", None));
                    return Ok(1);
                }
                let current: i64 = occupied.get().value.parse().map_err(|_| {
                    StoreError::UnexpectedReply(format!(
                        "non-integer value under counter key {key}"
                    ))
                })?;
                let next = current + 1;
                let expires_at = occupied.get().expires_at;
                occupied.insert(StoredValue {
                    value: next.to_string(),
                    expires_at,
                });
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new("1", None));
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + Duration::from_secs(ttl_seconds));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_marks_only_once() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("evt", "1", 60).await.unwrap());
        assert!(!store.set_if_absent("evt", "1", 60).await.unwrap());
    }

    #[tokio::test]
    async fn increment_counts_up_from_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("n").await.unwrap(), 1);
        assert_eq!(store.increment("n").await.unwrap(), 2);
        assert_eq!(store.increment("n").await.unwrap(), 3);
        assert_eq!(store.get("n").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemoryStore::new();
        store.set("k", "v", Some(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        // The marker can be claimed again once the old one lapsed.
        assert!(store.set_if_absent("k", "1", 60).await.unwrap());
    }

    #[tokio::test]
    async fn expire_applies_to_live_keys_only() {
        let store = MemoryStore::new();
        assert!(!store.expire("missing", 60).await.unwrap());

        store.set("k", "v", None).await.unwrap();
        assert!(store.expire("k", 1).await.unwrap());
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
