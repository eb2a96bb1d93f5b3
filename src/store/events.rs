//! Change events published by the view store.
//!
//! Every write, removal, or invalidation emits one [`StoreEvent`] per key
//! on the store's broadcast channel, after the write lock is released.
//! Subscribers (a rendering layer, a refetch scheduler, a test) react to
//! these instead of polling.

use crate::types::CacheKey;

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEventKind {
    /// The entry was inserted or replaced.
    Updated,
    /// The entry was removed.
    Removed,
    /// The entry is stale and its owner should refetch it.
    Invalidated,
}

/// A change to one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// The affected key.
    pub key: CacheKey,
    /// What happened.
    pub kind: StoreEventKind,
    /// Store stamp at the time of the change.
    pub stamp: u64,
}

impl StoreEvent {
    /// Create an event.
    pub fn new(key: CacheKey, kind: StoreEventKind, stamp: u64) -> Self {
        Self { key, kind, stamp }
    }
}
