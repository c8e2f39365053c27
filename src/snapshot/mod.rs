//! SharedSnapshot - A copy-on-write cell with `Arc` versions
//!
//! A [SharedSnapshot] can be used in place of a `RwLock` when readers hold
//! on to the data for a long time. Readers take a [SnapshotHandle] under a
//! lock that only covers an `Arc` clone, and from then on read without any
//! lock at all. Writers are serialised by the same lock.
//!
//! A writer that finds no outstanding readers mutates the current version in
//! place. Otherwise the payload is cloned, the clone is mutated, and the clone
//! becomes the new current version. Readers keep the version they took for as
//! long as they hold the handle.
//!
//! Displaced versions are always dropped after the lock is released, so an
//! expensive `Drop` of `T` never extends the critical section.

use core::fmt;
use core::mem;
use core::ops::Deref;
use lock_api::{Mutex, RawMutex};
use std::sync::Arc;
use tracing::trace;

/// A copy-on-write cell serving point-in-time versions of `T`.
///
/// # Examples
/// ```
/// use snapcache::snapshot::SharedSnapshot;
///
/// let snap = SharedSnapshot::new(vec![1, 2]);
///
/// // Take a handle, then change the content.
/// let before = snap.read();
/// snap.mutate(|v| v.push(3));
///
/// // The earlier handle still sees the version it was given.
/// assert_eq!(*before, vec![1, 2]);
/// assert_eq!(*snap.read(), vec![1, 2, 3]);
/// ```
pub struct SharedSnapshot<T, R: RawMutex = crate::utils::DefaultRawMutex> {
    active: Mutex<R, Arc<T>>,
}

/// A read handle to one version of a [SharedSnapshot].
///
/// The version is kept alive for as long as the handle (or a clone of it)
/// exists, regardless of later writes to the cell.
#[derive(Debug)]
pub struct SnapshotHandle<T>(Arc<T>);

impl<T> Clone for SnapshotHandle<T> {
    fn clone(&self) -> Self {
        SnapshotHandle(self.0.clone())
    }
}

impl<T> Deref for SnapshotHandle<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> SnapshotHandle<T> {
    /// Returns true if both handles refer to the same version.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }

    /// The address of the version's storage.
    pub fn as_ptr(this: &Self) -> *const T {
        Arc::as_ptr(&this.0)
    }

    /// Unwrap the handle into the underlying `Arc`.
    pub fn into_arc(this: Self) -> Arc<T> {
        this.0
    }
}

impl<T> SharedSnapshot<T> {
    /// Create a new `SharedSnapshot` holding `data` as its first version,
    /// guarded by the default lock. Use `From` to pick another `RawMutex`.
    pub fn new(data: T) -> Self {
        Self::from(data)
    }
}

impl<T, R> SharedSnapshot<T, R>
where
    R: RawMutex,
{
    /// Take a handle to the current version. The content behind the handle
    /// never changes, even if writers commit while it is held.
    pub fn read(&self) -> SnapshotHandle<T> {
        let active = self.active.lock();
        SnapshotHandle(active.clone())
        // active ends here
    }

    /// Install `data` as the current version, returning the version it
    /// displaced.
    ///
    /// The new version is allocated before the lock is taken. The previous
    /// version is handed back to the caller, so it is released outside of
    /// the lock whenever the caller drops it.
    pub fn replace(&self, data: T) -> SnapshotHandle<T> {
        let mut next = Arc::new(data);
        {
            let mut active = self.active.lock();
            mem::swap(&mut *active, &mut next);
        }
        trace!("replace");
        SnapshotHandle(next)
    }

    /// Consume the cell, returning the current version.
    pub fn into_inner(self) -> Arc<T> {
        self.active.into_inner()
    }
}

impl<T, R> SharedSnapshot<T, R>
where
    T: Clone,
    R: RawMutex,
{
    /// Apply `f` to the current content.
    ///
    /// When no handle to the current version exists, `f` runs on it in place.
    /// Otherwise the payload is cloned first, and the modified clone becomes
    /// the current version once `f` returns. Handles taken before this call
    /// never observe the change.
    ///
    /// If `f` panics on the in-place path the content may be left partially
    /// modified. Use [`try_mutate`](Self::try_mutate) when `f` can fail.
    pub fn mutate<F, U>(&self, f: F) -> U
    where
        F: FnOnce(&mut T) -> U,
    {
        let mut active = self.active.lock();
        if let Some(data) = Arc::get_mut(&mut *active) {
            trace!("mutate in place");
            return f(data);
        }

        trace!("mutate cloned shared version");
        let mut work = T::clone(&**active);
        let r = f(&mut work);
        let prev = mem::replace(&mut *active, Arc::new(work));
        drop(active);
        // prev may be the last reference, release it outside the lock.
        drop(prev);
        r
    }

    /// Apply a fallible `f` to a working copy of the current content.
    ///
    /// The copy is committed only when `f` returns `Ok`. On `Err` the cell is
    /// left exactly as it was and the error is handed back unchanged.
    pub fn try_mutate<F, U, E>(&self, f: F) -> Result<U, E>
    where
        F: FnOnce(&mut T) -> Result<U, E>,
    {
        let mut active = self.active.lock();
        let mut work = T::clone(&**active);
        match f(&mut work) {
            Ok(r) => {
                let prev = mem::replace(&mut *active, Arc::new(work));
                drop(active);
                drop(prev);
                Ok(r)
            }
            Err(e) => {
                drop(active);
                trace!("try_mutate rolled back");
                Err(e)
            }
        }
    }

    /// Exclusive access to the content. As `&mut self` proves there is no
    /// concurrent writer, no lock is taken, but the version is still cloned
    /// first if handles to it are outstanding.
    pub fn get_mut(&mut self) -> &mut T {
        Arc::make_mut(self.active.get_mut())
    }
}

impl<T, R> Default for SharedSnapshot<T, R>
where
    T: Default,
    R: RawMutex,
{
    fn default() -> Self {
        Self::from(T::default())
    }
}

impl<T, R> From<T> for SharedSnapshot<T, R>
where
    R: RawMutex,
{
    fn from(data: T) -> Self {
        SharedSnapshot {
            active: Mutex::new(Arc::new(data)),
        }
    }
}

impl<T, R> fmt::Debug for SharedSnapshot<T, R>
where
    T: fmt::Debug,
    R: RawMutex,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSnapshot")
            .field("active", &*self.read())
            .finish()
    }
}
