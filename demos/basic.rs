//! Basic usage examples for ChannelPool

use channel_connpool::{ChannelPool, PoolConfiguration, PoolError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn main() {
    println!("=== channel_connpool - Basic Examples ===\n");

    // Example 1: Borrow and return
    simple_pool();

    // Example 2: Exhaustion creates instead of waiting
    exhaustion();

    // Example 3: RAII guard
    guard_usage();

    // Example 4: Release and metrics
    release_and_metrics();
}

fn counting_config(counter: Arc<AtomicUsize>) -> PoolConfiguration<usize> {
    PoolConfiguration::new()
        .with_factory(move || Ok(counter.fetch_add(1, Ordering::Relaxed)))
        .with_close(|conn| {
            println!("   closing connection {}", conn);
            Ok(())
        })
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ChannelPool::new(
        counting_config(Arc::new(AtomicUsize::new(0)))
            .with_initial_cap(3)
            .with_max_cap(5),
    )
    .unwrap();

    let conn = pool.get().unwrap();
    println!("   Got connection: {}", conn);
    println!("   Idle while borrowed: {}", pool.len());

    pool.put(conn).unwrap();
    println!("   Idle after return: {}\n", pool.len());
}

fn exhaustion() {
    println!("2. Exhaustion:");
    let created = Arc::new(AtomicUsize::new(0));
    let pool = ChannelPool::new(
        counting_config(Arc::clone(&created))
            .with_initial_cap(1)
            .with_max_cap(1),
    )
    .unwrap();

    let first = pool.get().unwrap();
    let second = pool.get().unwrap();
    println!("   Borrowed {} and {}, factory calls: {}", first, second, created.load(Ordering::Relaxed));

    pool.put(first).unwrap();
    // The idle store holds one connection, so this one is closed
    pool.put(second).unwrap();
    println!("   Idle after returning both: {}\n", pool.len());
}

fn guard_usage() {
    println!("3. RAII Guard:");
    let pool = ChannelPool::new(counting_config(Arc::new(AtomicUsize::new(100)))).unwrap();

    {
        let conn = pool.acquire().unwrap();
        println!("   Using connection {}", *conn);
        // Connection returned when `conn` goes out of scope
    }

    println!("   Idle after guard dropped: {}\n", pool.len());
}

fn release_and_metrics() {
    println!("4. Release and Metrics:");
    let pool = ChannelPool::new(
        counting_config(Arc::new(AtomicUsize::new(0)))
            .with_initial_cap(2)
            .with_max_cap(4),
    )
    .unwrap();

    let conn = pool.get().unwrap();
    pool.release();

    match pool.get() {
        Err(PoolError::Closed) => println!("   Borrow after release: pool is closed"),
        other => println!("   Unexpected: {:?}", other),
    }

    // Returning after release closes the connection
    pool.put(conn).unwrap();

    println!("\n   Metrics:");
    for (key, value) in pool.export_metrics() {
        println!("     {}: {}", key, value);
    }
}
