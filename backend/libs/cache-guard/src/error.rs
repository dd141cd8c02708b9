//! Error types for the cache layer.

use thiserror::Error;

/// Cache layer errors.
///
/// A malformed cached payload surfaces as [`CacheError::Serialization`] and
/// fails the read; it is never silently treated as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Cached payload could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Source-of-truth loader failed
    #[error(transparent)]
    Source(#[from] anyhow::Error),

    /// Mutex read path exhausted its retry budget
    #[error("lock contended: gave up on {key} after {attempts} attempts")]
    LockContended { key: String, attempts: u32 },
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
