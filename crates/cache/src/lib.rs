pub mod counter;
pub mod error;
pub mod redis_cache;

pub use counter::{CounterStore, MemoryCounterStore};
pub use error::{CacheError, Result};
pub use redis_cache::{metrics_key, rate_limit_key, Cache, CacheConfig};
