//! Statistics hooks for [ObjectCache](super::ObjectCache).

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics hooks for an [ObjectCache](super::ObjectCache).
///
/// Hooks are called with `&self`, as they fire from any thread calling `get`
/// as well as from the destruction hook of whichever thread drops the last
/// handle of an instance.
pub trait PoolStat<K>: Send + Sync {
    /// Record a `get` that found a live instance.
    fn hit(&self, _k: &K) {}

    /// Record a new instance being built for `k`.
    fn construct(&self, _k: &K) {}

    /// Record a builder failure for `k`. Nothing was registered.
    fn construct_failed(&self, _k: &K) {}

    /// Record the registry entry of `k` being erased after its last handle
    /// was dropped.
    fn expire(&self, _k: &K) {}

    /// Record that an expiring instance found `k` already reused by a newer
    /// live instance, so the entry was kept.
    fn expire_skipped(&self, _k: &K) {}
}

impl<K> PoolStat<K> for () {}

#[derive(Debug, Default)]
/// A stat collector that traces the keys of every pool event.
pub struct TraceStat {}

impl<K> PoolStat<K> for TraceStat
where
    K: Debug,
{
    /// _
    fn hit(&self, k: &K) {
        tracing::trace!(?k, "hit");
    }

    /// _
    fn construct(&self, k: &K) {
        tracing::trace!(?k, "construct");
    }

    /// _
    fn construct_failed(&self, k: &K) {
        tracing::trace!(?k, "construct_failed");
    }

    /// _
    fn expire(&self, k: &K) {
        tracing::trace!(?k, "expire");
    }

    /// _
    fn expire_skipped(&self, k: &K) {
        tracing::trace!(?k, "expire_skipped");
    }
}

/// A simple set of counters for the pool.
#[derive(Debug, Default)]
pub struct CountStat {
    hits: AtomicU64,
    constructs: AtomicU64,
    construct_failures: AtomicU64,
    expires: AtomicU64,
    expire_skips: AtomicU64,
}

/// The values of a [CountStat] at one point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountSnapshot {
    /// The number of `get` calls served by a live instance
    pub hits: u64,
    /// The number of instances built
    pub constructs: u64,
    /// The number of builder failures
    pub construct_failures: u64,
    /// The number of registry entries erased by expiring instances
    pub expires: u64,
    /// The number of expiring instances whose key had already been reused
    pub expire_skips: u64,
}

impl CountStat {
    /// Read the current counter values.
    pub fn snapshot(&self) -> CountSnapshot {
        CountSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            constructs: self.constructs.load(Ordering::Relaxed),
            construct_failures: self.construct_failures.load(Ordering::Relaxed),
            expires: self.expires.load(Ordering::Relaxed),
            expire_skips: self.expire_skips.load(Ordering::Relaxed),
        }
    }
}

impl<K> PoolStat<K> for CountStat {
    fn hit(&self, _k: &K) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn construct(&self, _k: &K) {
        self.constructs.fetch_add(1, Ordering::Relaxed);
    }

    fn construct_failed(&self, _k: &K) {
        self.construct_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn expire(&self, _k: &K) {
        self.expires.fetch_add(1, Ordering::Relaxed);
    }

    fn expire_skipped(&self, _k: &K) {
        self.expire_skips.fetch_add(1, Ordering::Relaxed);
    }
}
