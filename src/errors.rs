//! Error types for the connection pool

use std::sync::Arc;
use thiserror::Error;

/// Error type returned by the user-supplied factory, close and ping callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of a callback error, kept behind an `Arc` so `PoolError` stays `Clone`.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid pool configuration, reported before any connection is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid capacity settings: initial {initial}, max {max}")]
    InvalidCapacity { initial: usize, max: usize },

    #[error("invalid factory func settings: a factory is required")]
    MissingFactory,

    #[error("invalid close func settings: a close function is required")]
    MissingClose,
}

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("factory is not able to create a connection: {0}")]
    Creation(#[source] SharedError),

    #[error("failed to close connection: {0}")]
    Destruction(#[source] SharedError),

    #[error("connection failed validation: {0}")]
    Validation(#[source] SharedError),

    #[error("pool is closed")]
    Closed,

    #[error("connection is nil, rejecting")]
    NilResource,

    #[error("blocking pool operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn creation(err: BoxError) -> Self {
        PoolError::Creation(Arc::from(err))
    }

    pub(crate) fn destruction(err: BoxError) -> Self {
        PoolError::Destruction(Arc::from(err))
    }

    pub(crate) fn validation(err: BoxError) -> Self {
        PoolError::Validation(Arc::from(err))
    }

    /// Whether this error means the pool has been released.
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
