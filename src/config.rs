//! Pool configuration options

use crate::errors::{BoxError, ConfigError, PoolError};
use crate::eviction::EvictionPolicy;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Creates a new connection.
pub type Factory<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Closes a connection, consuming it.
pub type CloseFn<T> = Arc<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;

/// Checks that a connection is still usable.
pub type PingFn<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// Receives errors the pool handles internally and cannot return to a caller.
pub type ErrorHook = Arc<dyn Fn(&PoolError) + Send + Sync>;

/// Numeric pool limits, separable from the callbacks so they can be loaded from a file.
///
/// # Examples
///
/// ```
/// use channel_connpool::PoolLimits;
/// use std::time::Duration;
///
/// let limits = PoolLimits {
///     initial_cap: 2,
///     max_cap: 8,
///     idle_timeout: Duration::from_secs(30),
/// };
/// assert!(limits.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolLimits {
    /// Connections created eagerly when the pool is built
    pub initial_cap: usize,

    /// Capacity of the idle store
    pub max_cap: usize,

    /// How long a connection may sit idle before it is closed on next borrow; zero disables
    pub idle_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            initial_cap: 0,
            max_cap: 10,
            idle_timeout: Duration::ZERO,
        }
    }
}

impl PoolLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cap == 0 || self.initial_cap > self.max_cap {
            return Err(ConfigError::InvalidCapacity {
                initial: self.initial_cap,
                max: self.max_cap,
            });
        }
        Ok(())
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy::from_idle_timeout(self.idle_timeout)
    }
}

/// Configuration for connection pool behavior
///
/// # Examples
///
/// ```
/// use channel_connpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<u32>::new()
///     .with_initial_cap(2)
///     .with_max_cap(16)
///     .with_factory(|| Ok(7))
///     .with_close(|_conn| Ok(()))
///     .with_idle_timeout(Duration::from_secs(60));
///
/// assert_eq!(config.limits.max_cap, 16);
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfiguration<T> {
    pub limits: PoolLimits,

    /// Creates a connection; required
    pub factory: Option<Factory<T>>,

    /// Closes a connection; required
    pub close: Option<CloseFn<T>>,

    /// Liveness check run before a pooled connection is handed out
    pub ping: Option<PingFn<T>>,

    /// Observer for close and validation failures the pool swallows
    pub error_hook: Option<ErrorHook>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            limits: PoolLimits::default(),
            factory: None,
            close: None,
            ping: None,
            error_hook: None,
        }
    }
}

impl<T> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            limits: self.limits,
            factory: self.factory.clone(),
            close: self.close.clone(),
            ping: self.ping.clone(),
            error_hook: self.error_hook.clone(),
        }
    }
}

impl<T> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("limits", &self.limits)
            .field("factory", &self.factory.is_some())
            .field("close", &self.close.is_some())
            .field("ping", &self.ping.is_some())
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all numeric limits at once
    pub fn with_limits(mut self, limits: PoolLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the number of connections created up front
    pub fn with_initial_cap(mut self, initial: usize) -> Self {
        self.limits.initial_cap = initial;
        self
    }

    /// Set the idle store capacity
    pub fn with_max_cap(mut self, max: usize) -> Self {
        self.limits.max_cap = max;
        self
    }

    /// Set the idle timeout; `Duration::ZERO` disables expiry
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.limits.idle_timeout = timeout;
        self
    }

    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn with_close<F>(mut self, close: F) -> Self
    where
        F: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.close = Some(Arc::new(close));
        self
    }

    /// Enable validation of idle connections before they are handed out
    pub fn with_ping<F>(mut self, ping: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.ping = Some(Arc::new(ping));
        self
    }

    /// Observe close and validation failures that the pool handles itself
    ///
    /// # Examples
    ///
    /// ```
    /// use channel_connpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<u8>::new()
    ///     .with_error_hook(|err| eprintln!("pool: {err}"));
    ///
    /// assert!(config.error_hook.is_some());
    /// ```
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PoolError) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Check capacity bounds and required callbacks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        if self.factory.is_none() {
            return Err(ConfigError::MissingFactory);
        }
        if self.close.is_none() {
            return Err(ConfigError::MissingClose);
        }
        Ok(())
    }
}
