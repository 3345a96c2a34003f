use channel_connpool::{ChannelPool, ConfigError, PoolConfiguration, PoolError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Records every factory and close call, flagging any connection closed twice.
#[derive(Default)]
struct Ledger {
    next_id: AtomicUsize,
    created: AtomicUsize,
    closed: Mutex<HashSet<usize>>,
    double_close: AtomicBool,
}

impl Ledger {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.lock().len()
    }

    fn config(self: &Arc<Self>, initial: usize, max: usize) -> PoolConfiguration<usize> {
        let factory = Arc::clone(self);
        let close = Arc::clone(self);
        PoolConfiguration::new()
            .with_initial_cap(initial)
            .with_max_cap(max)
            .with_factory(move || {
                factory.created.fetch_add(1, Ordering::SeqCst);
                Ok(factory.next_id.fetch_add(1, Ordering::SeqCst))
            })
            .with_close(move |conn| {
                if !close.closed.lock().insert(conn) {
                    close.double_close.store(true, Ordering::SeqCst);
                }
                Ok(())
            })
    }
}

#[test]
fn construction_prewarms_exactly_initial_connections() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(ledger.config(4, 6)).unwrap();

    assert_eq!(pool.len(), 4);
    assert_eq!(ledger.created(), 4);
    assert_eq!(ledger.closed(), 0);
}

#[test]
fn invalid_configuration_creates_nothing() {
    let cases = [(3, 2), (0, 0)];
    for (initial, max) in cases {
        let ledger = Arc::new(Ledger::default());
        let err = ChannelPool::new(ledger.config(initial, max)).unwrap_err();
        assert!(matches!(
            err,
            PoolError::Config(ConfigError::InvalidCapacity { .. })
        ));
        assert_eq!(ledger.created(), 0);
        assert_eq!(ledger.closed(), 0);
    }

    let missing_factory = PoolConfiguration::<usize>::new()
        .with_initial_cap(1)
        .with_close(|_| Ok(()));
    assert!(matches!(
        ChannelPool::new(missing_factory),
        Err(PoolError::Config(ConfigError::MissingFactory))
    ));

    let missing_close = PoolConfiguration::<usize>::new()
        .with_initial_cap(1)
        .with_factory(|| Ok(1));
    assert!(matches!(
        ChannelPool::new(missing_close),
        Err(PoolError::Config(ConfigError::MissingClose))
    ));
}

#[test]
fn prewarm_failure_closes_what_was_created() {
    let calls = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let factory_calls = Arc::clone(&calls);
    let close_calls = Arc::clone(&closed);

    let result = ChannelPool::new(
        PoolConfiguration::new()
            .with_initial_cap(5)
            .with_max_cap(5)
            .with_factory(move || {
                let n = factory_calls.fetch_add(1, Ordering::SeqCst);
                if n == 3 {
                    Err("too many open files".into())
                } else {
                    Ok(n)
                }
            })
            .with_close(move |_| {
                close_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );

    let err = result.unwrap_err();
    assert!(matches!(err, PoolError::Creation(_)));
    assert!(err.to_string().contains("too many open files"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(closed.load(Ordering::SeqCst), 3);
}

#[test]
fn borrow_after_return_yields_the_returned_connection() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(ledger.config(0, 3)).unwrap();

    for _ in 0..10 {
        let conn = pool.get().unwrap();
        pool.put(conn).unwrap();
        assert_eq!(pool.get().unwrap(), conn);
        pool.put(conn).unwrap();
    }
    assert_eq!(ledger.created(), 1);
}

#[test]
fn stale_connection_is_replaced_with_one_new_creation() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(
        ledger
            .config(1, 2)
            .with_idle_timeout(Duration::from_millis(30)),
    )
    .unwrap();

    let stale = pool.get().unwrap();
    pool.put(stale).unwrap();
    thread::sleep(Duration::from_millis(80));

    let fresh = pool.get().unwrap();
    assert_ne!(fresh, stale);
    assert_eq!(ledger.created(), 2);
    assert!(ledger.closed.lock().contains(&stale));
}

#[test]
fn always_failing_ping_never_hands_out_pooled_connections() {
    let ledger = Arc::new(Ledger::default());
    let hooked = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&hooked);
    let pool = ChannelPool::new(
        ledger
            .config(3, 3)
            .with_ping(|_| Err("ping timeout".into()))
            .with_error_hook(move |err| {
                assert!(matches!(err, PoolError::Validation(_)));
                hook_count.fetch_add(1, Ordering::SeqCst);
            }),
    )
    .unwrap();

    let conn = pool.get().unwrap();
    assert_eq!(conn, 3, "pooled connections 0..3 must all be skipped");
    assert_eq!(ledger.closed(), 3);
    assert_eq!(hooked.load(Ordering::SeqCst), 3);
    assert!(pool.is_empty());
}

#[test]
fn release_semantics() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(ledger.config(2, 4)).unwrap();
    let a = pool.get().unwrap();
    let b = pool.get().unwrap();

    pool.release();
    assert_eq!(ledger.closed(), 0, "borrowed connections stay open");
    assert!(matches!(pool.get(), Err(PoolError::Closed)));

    pool.put(a).unwrap();
    pool.close(b).unwrap();
    assert_eq!(ledger.closed(), 2);

    pool.release();
    drop(pool);
    assert_eq!(ledger.closed(), 2);
    assert!(!ledger.double_close.load(Ordering::SeqCst));
}

#[test]
fn release_drains_idle_connections_once() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(ledger.config(3, 3)).unwrap();

    pool.release();
    pool.release();
    drop(pool);

    assert_eq!(ledger.closed(), 3);
    assert!(!ledger.double_close.load(Ordering::SeqCst));
}

#[test]
fn close_failures_surface_only_to_direct_callers() {
    let hooked = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&hooked);
    let pool = ChannelPool::new(
        PoolConfiguration::<u8>::new()
            .with_initial_cap(2)
            .with_max_cap(2)
            .with_factory(|| Ok(1))
            .with_close(|_| Err("broken pipe".into()))
            .with_error_hook(move |_| {
                hook_count.fetch_add(1, Ordering::SeqCst);
            }),
    )
    .unwrap();

    // Direct close surfaces the error
    assert!(matches!(pool.close(7u8), Err(PoolError::Destruction(_))));
    // Overflow close on return surfaces it too
    assert!(matches!(pool.put(8u8), Err(PoolError::Destruction(_))));
    assert_eq!(hooked.load(Ordering::SeqCst), 0);

    // Drain-time failures go to the hook
    pool.release();
    assert_eq!(hooked.load(Ordering::SeqCst), 2);
    assert_eq!(pool.metrics().destroy_failures, 4);
}

#[test]
fn full_store_closes_returned_connection() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(ledger.config(2, 2)).unwrap();
    let extra = pool.get().unwrap();
    pool.put(extra).unwrap();

    let overflow: usize = 1000;
    pool.put(overflow).unwrap();

    assert_eq!(pool.len(), 2);
    assert!(ledger.closed.lock().contains(&overflow));
}

#[test]
fn nil_connections_are_rejected_without_closing() {
    let ledger = Arc::new(Ledger::default());
    let pool = ChannelPool::new(ledger.config(1, 2)).unwrap();

    assert!(matches!(pool.put(None::<usize>), Err(PoolError::NilResource)));
    assert!(matches!(pool.close(None::<usize>), Err(PoolError::NilResource)));
    assert_eq!(ledger.closed(), 0);
    assert_eq!(pool.len(), 1);
}

#[test]
fn concurrent_borrow_return_never_double_closes() {
    const THREADS: usize = 8;
    const CYCLES: usize = 1000;
    const MAX_CAP: usize = 4;

    let ledger = Arc::new(Ledger::default());
    let pool = Arc::new(ChannelPool::new(ledger.config(2, MAX_CAP)).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..CYCLES {
                    let conn = pool.get().unwrap();
                    pool.put(conn).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(pool.len() <= MAX_CAP);
    assert!(!ledger.double_close.load(Ordering::SeqCst));
    assert_eq!(ledger.created() - ledger.closed(), pool.len());

    pool.release();
    assert_eq!(ledger.created(), ledger.closed());
    assert!(!ledger.double_close.load(Ordering::SeqCst));
}

#[test]
fn release_racing_borrowers_leaks_nothing() {
    let ledger = Arc::new(Ledger::default());
    let pool = Arc::new(ChannelPool::new(ledger.config(4, 4)).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..500 {
                    match pool.get() {
                        Ok(conn) => pool.put(conn).unwrap(),
                        Err(PoolError::Closed) => break,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(1));
    pool.release();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.created(), ledger.closed());
    assert!(!ledger.double_close.load(Ordering::SeqCst));
}
