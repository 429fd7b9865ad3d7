//! Error types for store and lock operations.

/// Errors that can occur during cache store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The key holds a value of a different shape than the operation expects.
    #[error("wrong type at key {key}: expected {expected}")]
    WrongType {
        /// The key that was accessed.
        key: String,
        /// The shape the operation expected.
        expected: &'static str,
    },

    /// An increment targeted a value that is not an integer.
    #[error("value at key {0} is not an integer")]
    NotAnInteger(String),

    /// The backend rejected the command.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors that can occur while acquiring or releasing a lock.
///
/// A wait that simply runs out of time is not an error: acquisition returns
/// `Ok(None)` instead.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The wait was cut short before the lock could be granted.
    #[error("lock wait interrupted: {0}")]
    Interrupted(String),

    /// The lock backend failed.
    #[error("lock backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
        {
            Self::Unavailable(e.to_string())
        } else {
            Self::Backend(e.to_string())
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for LockError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}
