use thiserror::Error;

/// Main error type for the cache and context store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis connection or command failure (transient, caller may retry)
    #[error("Redis error: {0}")]
    Redis(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vector length does not match the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector index could not be created or inspected
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Check if error is related to Redis
    pub fn is_redis_error(&self) -> bool {
        matches!(self, StoreError::Redis(_))
    }

    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Redis(_) => true,
            StoreError::Serialization(_)
            | StoreError::DimensionMismatch { .. }
            | StoreError::VectorIndex(_)
            | StoreError::Config(_)
            | StoreError::InvalidArgument(_)
            | StoreError::Internal(_) => false,
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
