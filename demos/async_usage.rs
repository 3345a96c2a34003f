//! Async usage examples

use channel_connpool::{ChannelPool, PoolConfiguration};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== channel_connpool - Async Examples ===\n");

    // Example 1: Async get
    async_get().await;

    // Example 2: Concurrent access
    concurrent_access().await;
}

fn slow_pool(initial: usize, max: usize) -> Arc<ChannelPool<usize>> {
    let next_id = AtomicUsize::new(0);
    let pool = ChannelPool::new(
        PoolConfiguration::new()
            .with_initial_cap(initial)
            .with_max_cap(max)
            .with_factory(move || {
                // Simulate a connection handshake
                std::thread::sleep(Duration::from_millis(20));
                Ok(next_id.fetch_add(1, Ordering::Relaxed))
            })
            .with_close(|_| Ok(())),
    )
    .unwrap();
    Arc::new(pool)
}

async fn async_get() {
    println!("1. Async Get:");
    let pool = slow_pool(1, 3);

    let conn = pool.get_async().await.unwrap();
    println!("   Got connection asynchronously: {}", conn);
    pool.put(conn).unwrap();

    println!();
}

async fn concurrent_access() {
    println!("2. Concurrent Access:");
    let pool = slow_pool(2, 4);

    let mut handles = vec![];

    for i in 0..8 {
        let pool_clone = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool_clone.get_async().await {
                Ok(conn) => {
                    println!("   Task {} got connection: {}", i, conn);
                    sleep(Duration::from_millis(50)).await;
                    if let Err(e) = pool_clone.put(conn) {
                        println!("   Task {} put failed: {}", i, e);
                    }
                }
                Err(e) => println!("   Task {} error: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final idle: {}", pool.len());
    println!("   Connections created: {}", pool.metrics().created);

    pool.release_async().await.unwrap();
}
