use crate::error::Result;
use redis::{aio::ConnectionManager, Client};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// `None` selects the in-process counter store
    pub url: Option<String>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
        }
    }
}

#[derive(Clone)]
pub struct Cache {
    manager: ConnectionManager,
}

impl Cache {
    pub async fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self { manager })
    }

    /// Add `delta` to a counter and (re)arm its TTL in one round trip
    pub async fn incr_by_with_ttl(&self, key: &str, delta: i64, ttl_seconds: u64) -> Result<i64> {
        let mut conn = self.manager.clone();
        let (value,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, delta)
            .expire(key, ttl_seconds as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Read several integer counters; missing keys come back as `None`
    pub async fn get_counters(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.manager.clone();
        let values: Vec<Option<i64>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

// Helper functions for common cache key patterns
pub fn rate_limit_key(identifier: &str, window: u64) -> String {
    format!("ratelimit:{}:{}", identifier, window)
}

pub fn metrics_key(bucket: u64, series: &str) -> String {
    format!("metrics:{}:{}", bucket, series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_patterns() {
        assert_eq!(rate_limit_key("user_1", 42), "ratelimit:user_1:42");
        assert_eq!(metrics_key(7, "total"), "metrics:7:total");
    }

    #[tokio::test]
    #[ignore] // Only run with Redis available
    async fn test_redis_connection() {
        let url = CacheConfig::from_env().url.expect("REDIS_URL must be set");
        let cache = Cache::new(&url).await.expect("Failed to connect to Redis");
        cache.ping().await.expect("Failed to ping Redis");
    }

    #[tokio::test]
    #[ignore]
    async fn test_counters() {
        let url = CacheConfig::from_env().url.expect("REDIS_URL must be set");
        let cache = Cache::new(&url).await.unwrap();

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let key = format!("test_counter:{}", nanos);
        assert_eq!(cache.incr_by_with_ttl(&key, 2, 60).await.unwrap(), 2);
        assert_eq!(cache.incr_by_with_ttl(&key, 3, 60).await.unwrap(), 5);

        let missing = format!("test_missing:{}", nanos);
        let values = cache.get_counters(&[key, missing]).await.unwrap();
        assert_eq!(values, vec![Some(5), None]);
    }
}
