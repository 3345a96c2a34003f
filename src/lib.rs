//! # channel_connpool
//!
//! Bounded, thread-safe pool for expensive-to-create connections (sockets,
//! database handles, or anything else the caller knows how to open and close).
//!
//! ## Features
//!
//! - Lock-free FIFO idle store with a fixed capacity
//! - Injected factory, close and optional ping callbacks
//! - Pre-warming to an initial connection count
//! - Lazy idle-timeout eviction at borrow time
//! - Never blocks on exhaustion: a new connection is created instead
//! - Idempotent release that closes every idle connection
//! - Automatic return of connections via RAII (Drop trait)
//! - Async wrappers for tokio callers
//! - Pool metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use channel_connpool::{ChannelPool, PoolConfiguration};
//!
//! let pool = ChannelPool::new(
//!     PoolConfiguration::<u64>::new()
//!         .with_initial_cap(2)
//!         .with_max_cap(10)
//!         .with_factory(|| Ok(42))
//!         .with_close(|_conn| Ok(())),
//! )
//! .unwrap();
//!
//! let conn = pool.get().unwrap();
//! println!("Got: {}", conn);
//! pool.put(conn).unwrap();
//!
//! pool.release();
//! assert!(pool.get().is_err());
//! ```

mod pool;
mod config;
mod metrics;
mod eviction;
mod errors;

pub use pool::{ChannelPool, Pool, PooledConn};
pub use config::{CloseFn, ErrorHook, Factory, PingFn, PoolConfiguration, PoolLimits};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use eviction::EvictionPolicy;
pub use errors::{BoxError, ConfigError, PoolError, PoolResult, SharedError};
