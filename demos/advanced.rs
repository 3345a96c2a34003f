//! Advanced features: idle eviction, validation, error hooks, Prometheus export

use channel_connpool::{ChannelPool, PoolConfiguration, PoolLimits};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
    healthy: Arc<AtomicBool>,
}

impl Connection {
    fn open(id: usize) -> Self {
        Self {
            id,
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }
}

fn main() {
    println!("=== channel_connpool - Advanced Features ===\n");

    // Example 1: Idle timeout
    idle_eviction();

    // Example 2: Ping validation
    validation();

    // Example 3: Error hook
    error_hook();

    // Example 4: Prometheus metrics
    prometheus_export();
}

fn connection_config() -> PoolConfiguration<Connection> {
    let next_id = AtomicUsize::new(1);
    PoolConfiguration::new()
        .with_factory(move || Ok(Connection::open(next_id.fetch_add(1, Ordering::Relaxed))))
        .with_close(|conn: Connection| {
            println!("   closing connection {}", conn.id);
            Ok(())
        })
}

fn idle_eviction() {
    println!("1. Idle Timeout:");

    let limits = PoolLimits {
        initial_cap: 2,
        max_cap: 4,
        idle_timeout: Duration::from_millis(100),
    };
    let pool = ChannelPool::new(connection_config().with_limits(limits)).unwrap();

    println!("   Idle: {}", pool.len());
    thread::sleep(Duration::from_millis(150));

    // Both idle connections are stale; they are closed and a fresh one created
    let conn = pool.get().unwrap();
    println!("   Got fresh connection {}", conn.id);
    println!("   Evicted: {}\n", pool.metrics().idle_evictions);
}

fn validation() {
    println!("2. Ping Validation:");

    let pool = ChannelPool::new(
        connection_config()
            .with_initial_cap(1)
            .with_max_cap(2)
            .with_ping(|conn: &Connection| {
                if conn.healthy.load(Ordering::Relaxed) {
                    Ok(())
                } else {
                    Err(format!("connection {} is broken", conn.id).into())
                }
            }),
    )
    .unwrap();

    let conn = pool.get().unwrap();
    conn.healthy.store(false, Ordering::Relaxed);
    let broken_id = conn.id;
    pool.put(conn).unwrap();

    let conn = pool.get().unwrap();
    println!("   Broken connection {} skipped, got {}\n", broken_id, conn.id);
}

fn error_hook() {
    println!("3. Error Hook:");

    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    let pool = ChannelPool::new(
        PoolConfiguration::<usize>::new()
            .with_initial_cap(3)
            .with_max_cap(3)
            .with_factory(|| Ok(0))
            .with_close(|_| Err("socket already closed".into()))
            .with_error_hook(move |err| {
                seen.fetch_add(1, Ordering::Relaxed);
                println!("   hook: {}", err);
            }),
    )
    .unwrap();

    // Close failures during the drain cannot be returned, so they go to the hook
    pool.release();
    println!("   Failures observed: {}\n", failures.load(Ordering::Relaxed));
}

fn prometheus_export() {
    println!("4. Prometheus Export:");

    let pool = ChannelPool::new(connection_config().with_initial_cap(2).with_max_cap(8)).unwrap();
    let conn = pool.get().unwrap();
    pool.put(conn).unwrap();

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "orders".to_string());

    match pool.export_metrics_prometheus("orders_db", Some(&tags)) {
        Ok(output) => println!("{}", output),
        Err(e) => println!("   export failed: {}", e),
    }
}
