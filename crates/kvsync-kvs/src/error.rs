/// Errors from key-value store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KvsError {
    /// The wait for the next update was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The key (or key prefix) is not in the store.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// The store state lock was poisoned.
    #[error("store lock poisoned")]
    Poisoned,

    /// Failure reported by a store backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for key-value store operations.
pub type KvsResult<T> = Result<T, KvsError>;
