use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Counter store failures. Callers treat all of them as "store down".
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}
