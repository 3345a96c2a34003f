//! Idle expiry for pooled connections

use std::time::{Duration, Instant};

/// Eviction policy applied to connections waiting in the idle store.
///
/// Expiry is checked lazily: only the entry a borrower just popped is
/// inspected, there is no background sweep.
///
/// # Examples
///
/// ```
/// use channel_connpool::EvictionPolicy;
/// use std::time::Duration;
///
/// assert_eq!(EvictionPolicy::from_idle_timeout(Duration::ZERO), EvictionPolicy::None);
/// assert_eq!(
///     EvictionPolicy::from_idle_timeout(Duration::from_secs(30)),
///     EvictionPolicy::IdleTimeout(Duration::from_secs(30)),
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Idle connections never expire
    #[default]
    None,

    /// Connections idle for longer than this are closed on next access
    IdleTimeout(Duration),
}

impl EvictionPolicy {
    /// A zero timeout disables expiry.
    pub fn from_idle_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            EvictionPolicy::None
        } else {
            EvictionPolicy::IdleTimeout(timeout)
        }
    }

    pub(crate) fn is_expired(&self, idle_since: Instant, now: Instant) -> bool {
        match self {
            EvictionPolicy::None => false,
            EvictionPolicy::IdleTimeout(timeout) => {
                idle_since
                    .checked_add(*timeout)
                    .is_some_and(|deadline| deadline < now)
            }
        }
    }
}

/// A connection sitting in the idle store, stamped with the time it was put there.
pub(crate) struct IdleConn<T> {
    pub conn: T,
    pub idle_since: Instant,
}

impl<T> IdleConn<T> {
    pub fn new(conn: T) -> Self {
        Self {
            conn,
            idle_since: Instant::now(),
        }
    }

    pub fn is_expired(&self, policy: &EvictionPolicy, now: Instant) -> bool {
        policy.is_expired(self.idle_since, now)
    }

    pub fn into_inner(self) -> T {
        self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_never_expires() {
        let entry = IdleConn::new(1);
        let later = entry.idle_since + Duration::from_secs(3600);
        assert!(!entry.is_expired(&EvictionPolicy::None, later));
    }

    #[test]
    fn idle_timeout_expires_strictly_after_deadline() {
        let policy = EvictionPolicy::IdleTimeout(Duration::from_secs(10));
        let entry = IdleConn::new("conn");

        assert!(!entry.is_expired(&policy, entry.idle_since));
        assert!(!entry.is_expired(&policy, entry.idle_since + Duration::from_secs(10)));
        assert!(entry.is_expired(&policy, entry.idle_since + Duration::from_secs(11)));
    }

    #[test]
    fn huge_timeout_does_not_overflow() {
        let policy = EvictionPolicy::IdleTimeout(Duration::MAX);
        let entry = IdleConn::new(());
        assert!(!entry.is_expired(&policy, Instant::now()));
    }
}
