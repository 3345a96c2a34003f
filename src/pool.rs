//! Core connection pool implementation

use crate::config::{CloseFn, ErrorHook, Factory, PingFn, PoolConfiguration};
use crate::errors::{ConfigError, PoolError, PoolResult};
use crate::eviction::{EvictionPolicy, IdleConn};
use crate::metrics::{MetricsTracker, PoolMetrics};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
#[cfg(feature = "metrics")]
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Basic operations every connection pool offers.
pub trait Pool {
    type Conn;

    /// Borrow a connection, creating one if none is idle.
    fn get(&self) -> PoolResult<Self::Conn>;

    /// Hand a connection back for reuse.
    fn put(&self, conn: Option<Self::Conn>) -> PoolResult<()>;

    /// Close a single connection.
    fn close(&self, conn: Option<Self::Conn>) -> PoolResult<()>;

    /// Close every idle connection and refuse further borrows.
    fn release(&self);

    /// Number of idle connections.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Open,
    Closed,
}

/// Bounded pool of idle connections backed by a lock-free FIFO.
///
/// Borrowing never waits for a connection to come back: when the idle store
/// is empty a new connection is created on the spot, so the number of live
/// connections can briefly exceed `max_cap`. Only the idle store is bounded.
///
/// The state lock is held while the factory runs on the creation path and is
/// never held while close or ping run. Callbacks must not call back into the
/// pool.
pub struct ChannelPool<T> {
    conns: ArrayQueue<IdleConn<T>>,
    state: Mutex<PoolState>,
    factory: Factory<T>,
    close: CloseFn<T>,
    ping: Option<PingFn<T>>,
    error_hook: Option<ErrorHook>,
    eviction: EvictionPolicy,
    metrics: MetricsTracker,
    capacity: usize,
}

impl<T> ChannelPool<T> {
    /// Create a pool and fill it with `initial_cap` connections.
    ///
    /// Fails with [`PoolError::Config`] before anything is created if the
    /// configuration is invalid. If the factory fails while pre-warming, the
    /// connections created so far are closed and the factory error returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use channel_connpool::{ChannelPool, PoolConfiguration};
    ///
    /// let pool = ChannelPool::new(
    ///     PoolConfiguration::<String>::new()
    ///         .with_initial_cap(3)
    ///         .with_max_cap(5)
    ///         .with_factory(|| Ok("conn".to_string()))
    ///         .with_close(|_| Ok(())),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(pool.len(), 3);
    /// ```
    pub fn new(config: PoolConfiguration<T>) -> PoolResult<Self> {
        let PoolConfiguration {
            limits,
            factory,
            close,
            ping,
            error_hook,
        } = config;
        limits.validate()?;
        let factory = factory.ok_or(ConfigError::MissingFactory)?;
        let close = close.ok_or(ConfigError::MissingClose)?;

        let pool = Self {
            conns: ArrayQueue::new(limits.max_cap),
            state: Mutex::new(PoolState::Open),
            factory,
            close,
            ping,
            error_hook,
            eviction: limits.eviction_policy(),
            metrics: MetricsTracker::new(),
            capacity: limits.max_cap,
        };

        for created in 0..limits.initial_cap {
            match (pool.factory)() {
                Ok(conn) => {
                    MetricsTracker::incr(&pool.metrics.created);
                    if let Err(rejected) = pool.conns.push(IdleConn::new(conn)) {
                        // initial_cap <= max_cap, so the store cannot be full here
                        pool.destroy_quietly(rejected.into_inner());
                    }
                }
                Err(err) => {
                    warn!(created, error = %err, "factory is not able to fill the pool");
                    pool.release();
                    return Err(PoolError::creation(err));
                }
            }
        }

        debug!(
            initial = limits.initial_cap,
            max = limits.max_cap,
            "connection pool ready"
        );
        Ok(pool)
    }

    /// Borrow a connection.
    ///
    /// Idle connections are tried in FIFO order. An entry that has outlived
    /// the idle timeout, or fails the ping, is closed and the next one is
    /// tried; close and ping failures here are reported to the error hook,
    /// not to the caller. When the idle store is empty a fresh connection is
    /// created synchronously.
    pub fn get(&self) -> PoolResult<T> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        loop {
            let Some(entry) = self.conns.pop() else {
                return self.create();
            };

            if entry.is_expired(&self.eviction, Instant::now()) {
                MetricsTracker::incr(&self.metrics.idle_evictions);
                debug!("closing connection that exceeded the idle timeout");
                self.destroy_quietly(entry.into_inner());
                continue;
            }

            let conn = entry.into_inner();
            if let Some(ping) = &self.ping
                && let Err(err) = ping(&conn)
            {
                MetricsTracker::incr(&self.metrics.validation_failures);
                self.report(PoolError::validation(err));
                self.destroy_quietly(conn);
                continue;
            }

            MetricsTracker::incr(&self.metrics.reused);
            return Ok(conn);
        }
    }

    /// Return a connection to the idle store.
    ///
    /// If the pool has been released, or the idle store is full, the
    /// connection is closed instead and the close result is returned.
    /// Passing `None` fails with [`PoolError::NilResource`].
    pub fn put(&self, conn: impl Into<Option<T>>) -> PoolResult<()> {
        let conn = conn.into().ok_or(PoolError::NilResource)?;

        let state = self.state.lock();
        if *state == PoolState::Closed {
            drop(state);
            return self.destroy(conn);
        }

        match self.conns.push(IdleConn::new(conn)) {
            Ok(()) => {
                drop(state);
                MetricsTracker::incr(&self.metrics.returned);
                Ok(())
            }
            Err(rejected) => {
                drop(state);
                MetricsTracker::incr(&self.metrics.overflow_closes);
                debug!(capacity = self.capacity, "idle store full, closing returned connection");
                self.destroy(rejected.into_inner())
            }
        }
    }

    /// Close a single connection outside the idle store.
    ///
    /// Works the same before and after [`release`](Self::release).
    pub fn close(&self, conn: impl Into<Option<T>>) -> PoolResult<()> {
        let conn = conn.into().ok_or(PoolError::NilResource)?;
        self.destroy(conn)
    }

    /// Run the ping callback against a connection.
    ///
    /// Succeeds trivially when no ping is configured.
    pub fn ping(&self, conn: Option<&T>) -> PoolResult<()> {
        let conn = conn.ok_or(PoolError::NilResource)?;
        match &self.ping {
            Some(ping) => ping(conn).map_err(PoolError::validation),
            None => Ok(()),
        }
    }

    /// Close every idle connection and mark the pool closed.
    ///
    /// Idempotent. Close failures during the drain go to the error hook.
    /// Connections still borrowed are closed when they are put back.
    pub fn release(&self) {
        {
            let mut state = self.state.lock();
            if *state == PoolState::Closed {
                return;
            }
            *state = PoolState::Closed;
        }

        let mut drained = 0usize;
        while let Some(entry) = self.conns.pop() {
            self.destroy_quietly(entry.into_inner());
            drained += 1;
        }
        debug!(drained, "connection pool released");
    }

    /// Number of idle connections. Advisory only under concurrent use.
    pub fn len(&self) -> usize {
        if self.is_closed() { 0 } else { self.conns.len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of idle connections kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == PoolState::Closed
    }

    /// Borrow a connection wrapped in a guard that puts it back on drop.
    ///
    /// # Examples
    ///
    /// ```
    /// use channel_connpool::{ChannelPool, PoolConfiguration};
    ///
    /// let pool = ChannelPool::new(
    ///     PoolConfiguration::<Vec<u8>>::new()
    ///         .with_factory(|| Ok(Vec::new()))
    ///         .with_close(|_| Ok(())),
    /// )
    /// .unwrap();
    ///
    /// {
    ///     let mut conn = pool.acquire().unwrap();
    ///     conn.push(1);
    /// }
    ///
    /// assert_eq!(pool.len(), 1);
    /// ```
    pub fn acquire(&self) -> PoolResult<PooledConn<'_, T>> {
        let conn = self.get()?;
        Ok(PooledConn {
            conn: Some(conn),
            pool: self,
        })
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let closed = self.is_closed();
        let idle = if closed { 0 } else { self.conns.len() };
        self.metrics.get_metrics(idle, self.capacity, closed)
    }

    /// Export metrics as a string map
    pub fn export_metrics(&self) -> std::collections::HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    fn create(&self) -> PoolResult<T> {
        let state = self.state.lock();
        if *state == PoolState::Closed {
            return Err(PoolError::Closed);
        }

        let created = (self.factory)();
        drop(state);

        match created {
            Ok(conn) => {
                MetricsTracker::incr(&self.metrics.created);
                debug!("idle store empty, created a new connection");
                Ok(conn)
            }
            Err(err) => Err(PoolError::creation(err)),
        }
    }

    fn destroy(&self, conn: T) -> PoolResult<()> {
        match (self.close)(conn) {
            Ok(()) => {
                MetricsTracker::incr(&self.metrics.destroyed);
                Ok(())
            }
            Err(err) => {
                MetricsTracker::incr(&self.metrics.destroy_failures);
                Err(PoolError::destruction(err))
            }
        }
    }

    fn destroy_quietly(&self, conn: T) {
        if let Err(err) = self.destroy(conn) {
            self.report(err);
        }
    }

    fn report(&self, err: PoolError) {
        warn!(error = %err, "connection pool dropped an error");
        if let Some(hook) = &self.error_hook {
            hook(&err);
        }
    }
}

impl<T: Send + 'static> ChannelPool<T> {
    /// Borrow a connection from an async context.
    ///
    /// The factory, ping and close callbacks are blocking, so the borrow runs
    /// on tokio's blocking thread pool.
    pub async fn get_async(self: &Arc<Self>) -> PoolResult<T> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Release the pool from an async context.
    pub async fn release_async(self: &Arc<Self>) -> PoolResult<()> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.release())
            .await
            .map_err(|_| PoolError::Cancelled)
    }
}

impl<T> Pool for ChannelPool<T> {
    type Conn = T;

    fn get(&self) -> PoolResult<T> {
        ChannelPool::get(self)
    }

    fn put(&self, conn: Option<T>) -> PoolResult<()> {
        ChannelPool::put(self, conn)
    }

    fn close(&self, conn: Option<T>) -> PoolResult<()> {
        ChannelPool::close(self, conn)
    }

    fn release(&self) {
        ChannelPool::release(self)
    }

    fn len(&self) -> usize {
        ChannelPool::len(self)
    }
}

impl<T> Drop for ChannelPool<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for ChannelPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("idle", &self.conns.len())
            .field("capacity", &self.capacity)
            .field("eviction", &self.eviction)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// A borrowed connection that goes back to its pool when dropped
pub struct PooledConn<'a, T> {
    conn: Option<T>,
    pool: &'a ChannelPool<T>,
}

impl<T> PooledConn<'_, T> {
    /// Take the connection out of the guard; it will not be returned to the pool
    pub fn detach(mut self) -> T {
        self.conn.take().expect("connection already taken")
    }

    /// Close the connection instead of returning it
    pub fn discard(mut self) -> PoolResult<()> {
        let conn = self.conn.take();
        self.pool.close(conn)
    }
}

impl<T> Deref for PooledConn<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already taken")
    }
}

impl<T> DerefMut for PooledConn<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already taken")
    }
}

impl<T> Drop for PooledConn<'_, T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(err) = self.pool.put(conn)
        {
            self.pool.report(err);
        }
    }
}
