/// The lock used by components unless the caller picks another `RawMutex`.
pub type DefaultRawMutex = parking_lot::RawMutex;

#[cfg(feature = "ahash")]
pub(crate) use ahash::RandomState;

#[cfg(all(feature = "foldhash", not(feature = "ahash")))]
pub(crate) use foldhash::fast::RandomState;

#[cfg(all(not(feature = "ahash"), not(feature = "foldhash")))]
pub(crate) use std::collections::hash_map::RandomState;
