//! Snapcache - Shared snapshots and self-pruning object pools
//!
//! Two building blocks for sharing data between threads:
//!
//! * [SharedSnapshot] - a copy-on-write cell. Readers take a handle to the
//!   current version under a lock that covers only an `Arc` clone, then read
//!   without blocking anyone for as long as they like. Writers are serialised,
//!   mutate in place when no reader holds the current version, and clone it
//!   otherwise. A handle never observes writes made after it was taken.
//!
//! * [ObjectCache] - a get-or-build pool keyed by `K`. While an instance is
//!   in use, every caller asking for its key shares it. When the last handle
//!   is dropped the instance is destroyed and its registry entry erased. The
//!   pool never keeps instances alive, and instances never keep the pool
//!   alive.
//!
//! # Features
//!
//! * `foldhash` - hash pool keys with foldhash (default)
//! * `ahash` - hash pool keys with ahash
//!
//! Without either, the standard library hasher is used.

#![warn(unused_extern_crates)]
#![warn(missing_docs)]

pub mod pool;
pub mod snapshot;

mod utils;

pub use pool::{CacheHandle, ObjectCache};
pub use snapshot::{SharedSnapshot, SnapshotHandle};
pub use utils::DefaultRawMutex;
