//! Pool-level counters and their export

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of pool activity
///
/// # Examples
///
/// ```
/// use channel_connpool::{ChannelPool, PoolConfiguration};
///
/// let pool = ChannelPool::new(
///     PoolConfiguration::<u32>::new()
///         .with_initial_cap(2)
///         .with_max_cap(4)
///         .with_factory(|| Ok(1))
///         .with_close(|_| Ok(())),
/// )
/// .unwrap();
///
/// let conn = pool.get().unwrap();
/// pool.put(conn).unwrap();
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.created, 2);
/// assert_eq!(metrics.reused, 1);
/// assert_eq!(metrics.idle_conns, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Connections produced by the factory
    pub created: usize,

    /// Borrows served from the idle store
    pub reused: usize,

    /// Connections accepted back into the idle store
    pub returned: usize,

    /// Close callbacks that completed successfully
    pub destroyed: usize,

    /// Close callbacks that failed
    pub destroy_failures: usize,

    /// Idle connections closed because they exceeded the idle timeout
    pub idle_evictions: usize,

    /// Idle connections closed because the ping failed
    pub validation_failures: usize,

    /// Returned connections closed because the idle store was full
    pub overflow_closes: usize,

    /// Connections currently idle
    pub idle_conns: usize,

    /// Idle store capacity
    pub max_capacity: usize,

    /// Whether the pool has been released
    pub closed: bool,
}

impl PoolMetrics {
    /// Idle store fill ratio (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.max_capacity > 0 {
            self.idle_conns as f64 / self.max_capacity as f64
        } else {
            0.0
        }
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("created".to_string(), self.created.to_string());
        metrics.insert("reused".to_string(), self.reused.to_string());
        metrics.insert("returned".to_string(), self.returned.to_string());
        metrics.insert("destroyed".to_string(), self.destroyed.to_string());
        metrics.insert("destroy_failures".to_string(), self.destroy_failures.to_string());
        metrics.insert("idle_evictions".to_string(), self.idle_evictions.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("overflow_closes".to_string(), self.overflow_closes.to_string());
        metrics.insert("idle_conns".to_string(), self.idle_conns.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization()));
        metrics.insert("closed".to_string(), self.closed.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Render metrics in the Prometheus text exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use channel_connpool::{ChannelPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ChannelPool::new(
    ///     PoolConfiguration::<u32>::new()
    ///         .with_factory(|| Ok(1))
    ///         .with_close(|_| Ok(())),
    /// )
    /// .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "db".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("primary", Some(&tags)).unwrap();
    /// assert!(output.contains("connpool_connections_idle"));
    /// assert!(output.contains("service=\"db\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        let registry = Registry::new_custom(Some("connpool".to_string()), Some(labels))?;
        let series: [(&str, &str, usize); 10] = [
            ("connections_idle", "Connections currently idle", metrics.idle_conns),
            ("connections_max", "Idle store capacity", metrics.max_capacity),
            ("connections_created_total", "Connections created by the factory", metrics.created),
            ("connections_reused_total", "Borrows served from the idle store", metrics.reused),
            ("connections_returned_total", "Connections returned to the idle store", metrics.returned),
            ("connections_destroyed_total", "Connections closed successfully", metrics.destroyed),
            ("close_failures_total", "Close callbacks that failed", metrics.destroy_failures),
            ("idle_evictions_total", "Connections closed after idling too long", metrics.idle_evictions),
            ("validation_failures_total", "Connections closed after a failed ping", metrics.validation_failures),
            ("overflow_closes_total", "Returned connections closed because the pool was full", metrics.overflow_closes),
        ];

        for (name, help, value) in series {
            let gauge = IntGauge::with_opts(Opts::new(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub reused: AtomicUsize,
    pub returned: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub destroy_failures: AtomicUsize,
    pub idle_evictions: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub overflow_closes: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, idle: usize, capacity: usize, closed: bool) -> PoolMetrics {
        PoolMetrics {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
            idle_evictions: self.idle_evictions.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            overflow_closes: self.overflow_closes.load(Ordering::Relaxed),
            idle_conns: idle,
            max_capacity: capacity,
            closed,
        }
    }
}
