//! Error types for engagement-service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache_guard::CacheError),

    /// External store (relational DB, follow relation, geo index) failure
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::NotFound("shop 42".to_string());
        assert_eq!(err.to_string(), "Not found: shop 42");

        let err = AppError::Validation("shop id is required".to_string());
        assert_eq!(err.to_string(), "Invalid input: shop id is required");
    }
}
