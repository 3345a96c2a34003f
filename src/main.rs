// channel_connpool demo binary
// The library lives in lib.rs; run the demos with: cargo run --example basic

use channel_connpool::{ChannelPool, PoolConfiguration};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    println!("=== channel_connpool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    let next_id = AtomicU32::new(1);
    let pool = match ChannelPool::new(
        PoolConfiguration::new()
            .with_initial_cap(2)
            .with_max_cap(4)
            .with_factory(move || Ok(next_id.fetch_add(1, Ordering::Relaxed)))
            .with_close(|conn| {
                println!("  closing connection #{conn}");
                Ok(())
            }),
    ) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("failed to build pool: {err}");
            std::process::exit(1);
        }
    };

    println!("Quick Demo:");
    match pool.get() {
        Ok(conn) => {
            println!("  Got connection #{conn}");
            if let Err(err) = pool.put(conn) {
                eprintln!("  put failed: {err}");
            }
        }
        Err(err) => eprintln!("  get failed: {err}"),
    }

    println!("  Idle after return: {}", pool.len());
    pool.release();
}
