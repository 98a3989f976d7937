//! Key-value store abstraction for dedup markers and daily counters.
//!
//! The relay only needs a handful of primitives: read a key, write a key with
//! an expiry, mark a key if nobody else has, bump a counter. Every backend
//! (redis, Upstash-style REST, in-process memory) maps onto the same trait so
//! the handler never knows which one is configured.

use async_trait::async_trait;
use chrono::NaiveDate;

pub mod memory;
pub mod redis;
pub mod rest;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use rest::RestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// Minimal async key-value interface shared by all store backends.
///
/// `set_if_absent` is the conditional mark used for dedup: it collapses the
/// read-then-write of the naive approach into a single store operation, so two
/// concurrent requests for the same key can't both observe "absent".
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StoreError>;

    /// Returns `true` if the key was freshly written, `false` if it already
    /// existed.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError>;

    /// Increments an integer counter, creating it at 0 when absent. Returns
    /// the value after the increment.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Applies an expiry to an existing key. Returns `false` when the key
    /// does not exist.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<bool, StoreError>;
}

/// Store key layout, kept in one place so the scoping policy is auditable.
pub struct StoreKeys;

impl StoreKeys {
    /// Dedup marker scoped to a Brazil-local calendar day.
    pub fn dedup_daily(date: NaiveDate, event_id: &str) -> String {
        format!("capi:dedup:{}:{}", date.format("%Y-%m-%d"), event_id)
    }

    /// Dedup marker with no day scoping; the TTL alone bounds the window.
    pub fn dedup_rolling(event_id: &str) -> String {
        format!("capi:dedup:{}", event_id)
    }

    /// Accepted-event counter for one Brazil-local calendar day.
    pub fn daily_count(date: NaiveDate) -> String {
        format!("capi:count:{}", date.format("%Y-%m-%d"))
    }
}
