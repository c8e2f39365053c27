//! ObjectCache - A self-pruning pool of shared instances
//!
//! An [ObjectCache] hands out [CacheHandle]s to instances built on demand
//! per key. While any handle to the instance of a key is alive, every `get`
//! for that key returns the same instance. Once the last handle is dropped
//! the instance is destroyed and its registry entry erased, so the pool
//! never keeps values alive and never grows with churn.
//!
//! The registry only holds `Weak` references. Each instance is wrapped with
//! a `Weak` reference back to its pool, and when the instance's last handle
//! is dropped it upgrades that reference to find the pool and erase its
//! entry. If the pool was already dropped the upgrade fails and the
//! instance simply goes away. Because the reference is weak, outstanding
//! handles never extend the lifetime of the pool.
//!
//! This is also why a pool only exists behind an `Arc`: `new` builds it with
//! `Arc::new_cyclic`, keeping a weak reference to itself for its instances.

pub mod stats;

use self::stats::PoolStat;
use crate::utils::RandomState;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use tracing::trace;

type Builder<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

// Implemented by the pool so that slots can call back without naming E or S.
trait Expire<K>: Send + Sync {
    fn expire(&self, key: &K);
}

struct Slot<K, V> {
    key: K,
    value: V,
    owner: Weak<dyn Expire<K>>,
}

impl<K, V> Drop for Slot<K, V> {
    fn drop(&mut self) {
        // The last handle is gone. No registry lock is held here, and value
        // is only dropped once this returns.
        match self.owner.upgrade() {
            Some(owner) => owner.expire(&self.key),
            None => trace!("pool dropped before its last handle, nothing to erase"),
        }
    }
}

/// A strong handle to an instance produced by an [ObjectCache].
///
/// The instance lives for as long as any handle to it does, independent of
/// the pool that built it.
pub struct CacheHandle<K, V>(Arc<Slot<K, V>>);

impl<K, V> CacheHandle<K, V> {
    /// The key this instance was built for.
    pub fn key(&self) -> &K {
        &self.0.key
    }

    /// Returns true if both handles refer to the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    /// The number of handles to this instance.
    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }
}

impl<K, V> Clone for CacheHandle<K, V> {
    fn clone(&self) -> Self {
        CacheHandle(self.0.clone())
    }
}

impl<K, V> Deref for CacheHandle<K, V> {
    type Target = V;

    #[inline]
    fn deref(&self) -> &V {
        &self.0.value
    }
}

impl<K, V> fmt::Debug for CacheHandle<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("key", &self.0.key)
            .field("value", &self.0.value)
            .finish()
    }
}

/// A get-or-build pool of shared instances of `V`, keyed by `K`.
///
/// `E` is the error type of the builder, and `S` collects statistics, see
/// [stats].
///
/// # Examples
/// ```
/// use snapcache::pool::{CacheHandle, ObjectCache};
///
/// let pool = ObjectCache::from_fn(|name: &String| name.to_uppercase());
///
/// let a = pool.fetch("ibm");
/// let b = pool.fetch("ibm");
/// assert!(CacheHandle::ptr_eq(&a, &b));
/// assert_eq!(*a, "IBM");
///
/// drop(a);
/// drop(b);
/// // The last handle took the registry entry with it.
/// assert!(pool.is_empty());
/// ```
pub struct ObjectCache<K, V, E = Infallible, S = ()> {
    this: Weak<Self>,
    registry: Mutex<HashMap<K, Weak<Slot<K, V>>, RandomState>>,
    builder: Builder<K, V, E>,
    stats: S,
}

impl<K, V, E> ObjectCache<K, V, E, ()>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: 'static,
{
    /// Create a pool that builds missing instances with `builder`. A builder
    /// error is returned from `get` and nothing is registered.
    pub fn new<F>(builder: F) -> Arc<Self>
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::with_stats(builder, ())
    }
}

impl<K, V> ObjectCache<K, V, Infallible, ()>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a pool from a builder that can not fail.
    pub fn from_fn<F>(f: F) -> Arc<Self>
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        Self::new(move |k| Ok(f(k)))
    }
}

impl<K, V, E, S> ObjectCache<K, V, E, S>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: 'static,
    S: PoolStat<K> + 'static,
{
    /// Create a pool reporting its events to `stats`.
    pub fn with_stats<F>(builder: F, stats: S) -> Arc<Self>
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Arc::new_cyclic(|this| ObjectCache {
            this: this.clone(),
            registry: Mutex::new(HashMap::with_hasher(RandomState::default())),
            builder: Box::new(builder),
            stats,
        })
    }

    /// Return the live instance for `key`, building it if there is none.
    ///
    /// The builder runs with the registry locked, so concurrent callers for
    /// the same key wait for it and then share its result. It must not call
    /// back into this pool.
    pub fn get<Q>(&self, key: &Q) -> Result<CacheHandle<K, V>, E>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let mut registry = self.registry.lock();
        if let Some(slot) = registry.get(key).and_then(Weak::upgrade) {
            drop(registry);
            self.stats.hit(&slot.key);
            return Ok(CacheHandle(slot));
        }

        // Absent, or the last handle is gone and the entry is expiring.
        let key = key.to_owned();
        let value = match (self.builder)(&key) {
            Ok(value) => value,
            Err(e) => {
                drop(registry);
                self.stats.construct_failed(&key);
                trace!(?key, "construct failed");
                return Err(e);
            }
        };

        let owner: Weak<dyn Expire<K>> = self.this.clone();
        let slot = Arc::new(Slot {
            key: key.clone(),
            value,
            owner,
        });
        // Displaces the weak of an expiring instance, if any.
        registry.insert(key, Arc::downgrade(&slot));
        drop(registry);

        self.stats.construct(&slot.key);
        trace!(key = ?slot.key, "construct");
        Ok(CacheHandle(slot))
    }

    /// Return the live instance for `key` without ever building one.
    pub fn peek<Q>(&self, key: &Q) -> Option<CacheHandle<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let registry = self.registry.lock();
        let slot = registry.get(key).and_then(Weak::upgrade);
        drop(registry);
        slot.map(CacheHandle)
    }

    /// Returns true while a live instance exists for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry
            .lock()
            .get(key)
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// The number of registry entries, including instances that are expiring
    /// but whose entry has not been erased yet.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns true if the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// The keys that currently have a live instance.
    pub fn live_keys(&self) -> Vec<K> {
        self.registry
            .lock()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// The statistics collector of this pool.
    pub fn stats(&self) -> &S {
        &self.stats
    }
}

impl<K, V, S> ObjectCache<K, V, Infallible, S>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: PoolStat<K> + 'static,
{
    /// As [`get`](Self::get), for pools whose builder can not fail.
    pub fn fetch<Q>(&self, key: &Q) -> CacheHandle<K, V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self.get(key) {
            Ok(handle) => handle,
            Err(never) => match never {},
        }
    }
}

impl<K, V, E, S> Expire<K> for ObjectCache<K, V, E, S>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: 'static,
    S: PoolStat<K> + 'static,
{
    fn expire(&self, key: &K) {
        let mut registry = self.registry.lock();
        // A new instance may have been registered for this key between the
        // last handle dropping and us getting the lock.
        let expired = registry.get(key).map(|w| w.strong_count() == 0);
        match expired {
            Some(true) => {
                registry.remove(key);
                drop(registry);
                self.stats.expire(key);
                trace!(?key, "expire");
            }
            Some(false) => {
                drop(registry);
                self.stats.expire_skipped(key);
                trace!(?key, "key reused by a live instance, entry kept");
            }
            None => {
                drop(registry);
                trace!(?key, "entry already erased");
            }
        }
    }
}

impl<K, V, E, S> fmt::Debug for ObjectCache<K, V, E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("len", &self.registry.lock().len())
            .finish()
    }
}
