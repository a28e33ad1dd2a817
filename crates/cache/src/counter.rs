//! Integer counters with expiry, shared by the rate limiter and the
//! metrics buckets.

use crate::error::Result;
use crate::redis_cache::Cache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `delta` to `key`, arm its TTL and return the new value
    async fn incr_by(&self, key: &str, delta: i64, ttl_seconds: u64) -> Result<i64>;

    /// Current values of `keys`, `None` for missing or expired ones
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>>;
}

#[async_trait]
impl CounterStore for Cache {
    async fn incr_by(&self, key: &str, delta: i64, ttl_seconds: u64) -> Result<i64> {
        self.incr_by_with_ttl(key, delta, ttl_seconds).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        self.get_counters(keys).await
    }
}

/// In-process counter store for development and tests.
/// State is per process, so limits are not shared between replicas.
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, (i64, Instant)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (i64, Instant)>> {
        // A poisoned map only ever holds plain integers.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_by(&self, key: &str, delta: i64, ttl_seconds: u64) -> Result<i64> {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_seconds);
        let mut entries = self.lock();

        // Window and bucket keys are never reused, so expired ones must go
        entries.retain(|_, (_, expires)| *expires > now);

        let entry = entries.entry(key.to_string()).or_insert((0, expires_at));
        entry.0 += delta;
        entry.1 = expires_at;
        Ok(entry.0)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        let now = Instant::now();
        let entries = self.lock();
        Ok(keys
            .iter()
            .map(|key| {
                entries
                    .get(key)
                    .filter(|(_, expires_at)| *expires_at > now)
                    .map(|(value, _)| *value)
            })
            .collect())
    }
}
