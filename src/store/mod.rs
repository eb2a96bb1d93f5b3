//! The view store: a keyed container of cached views with version stamps
//! and a change-event stream.
//!
//! # Architecture
//!
//! - [`StoreState`] holds the entries (in insertion order) plus per-key
//!   [`KeyMeta`] stamps. It is only reachable through the store's lock.
//! - [`StoreTxn`] is the write handle handed to [`ViewStore::write`]. A
//!   whole snapshot-and-apply sequence runs inside one transaction, so no
//!   other caller observes a half-applied mutation.
//! - [`StoreEvent`]s collected by a transaction are broadcast after the
//!   lock is released.
//!
//! # Version Stamps
//!
//! The store owns one monotonic `u64` counter. Every write, every
//! mutation context, and every fetch draws a fresh stamp from it. Per key
//! the store remembers:
//!
//! - `written`: stamp of the last write or removal,
//! - `claimed`: stamp of the newest mutation context that claimed the key,
//! - `fetch_issued`: stamp of the newest fetch started for the key,
//! - `fetch_cancelled`: stamp of the newest mutation that cancelled the
//!   key's in-flight fetches.
//!
//! Comparing these against a context's own stamp is how late responses are
//! recognised as stale.
//!
//! Stamps of a key that is no longer resident are only kept while an open
//! mutation context or an in-flight fetch still holds the key. Once the
//! last holder lets go the metadata is dropped, so it never outgrows the
//! resident entries plus the work in flight.
//!
//! # Examples
//!
//! ```
//! use taskboard_sync::{ViewSignature, ViewSnapshot, ViewStore};
//!
//! let store = ViewStore::new();
//! let signature = ViewSignature::workspace("w1");
//! store.set_task_list(signature.clone(), ViewSnapshot::default());
//! assert!(store.get_task_list(&signature).is_some());
//! ```

pub mod events;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;

pub use events::{StoreEvent, StoreEventKind};

use crate::constants::DEFAULT_EVENT_CAPACITY;
use crate::types::{
    CacheKey, CacheValue, MemberList, ProjectList, Task, ViewScope, ViewSignature, ViewSnapshot,
};

/// Stamps tracked per cache key. All zero for keys never touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyMeta {
    /// Stamp of the last write or removal.
    pub written: u64,
    /// Stamp of the newest mutation context that claimed the key.
    pub claimed: u64,
    /// Stamp of the newest fetch issued for the key.
    pub fetch_issued: u64,
    /// Stamp of the newest mutation that cancelled in-flight fetches.
    pub fetch_cancelled: u64,
    /// Open mutation contexts holding the key.
    pub open_contexts: u32,
    /// Fetches issued for the key and not finished yet.
    pub pending_fetches: u32,
    /// Set by [`StoreTxn::invalidate`], cleared by the next write.
    pub invalidated: bool,
}

impl KeyMeta {
    /// Returns `true` while a mutation context or a fetch holds the key.
    pub fn is_held(&self) -> bool {
        self.open_contexts > 0 || self.pending_fetches > 0
    }
}

/// Handle for an in-flight fetch, used to detect superseded responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// The key being fetched.
    pub key: CacheKey,
    /// Stamp drawn when the fetch was issued.
    pub stamp: u64,
}

/// Entries and stamps behind the store's lock.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    entries: IndexMap<CacheKey, CacheValue>,
    meta: HashMap<CacheKey, KeyMeta>,
    stamp: u64,
}

impl StoreState {
    /// Value under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.entries.get(key)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &IndexMap<CacheKey, CacheValue> {
        &self.entries
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest stamp handed out.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Stamps for `key`.
    pub fn meta(&self, key: &CacheKey) -> KeyMeta {
        self.meta.get(key).copied().unwrap_or_default()
    }

    /// Snapshot addressed by `signature`.
    pub fn task_list(&self, signature: &ViewSignature) -> Option<&ViewSnapshot> {
        self.entries
            .get(&CacheKey::TaskList(signature.clone()))
            .and_then(CacheValue::as_task_list)
    }

    /// Detail entry for `task_id`.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.entries
            .get(&CacheKey::Task(task_id.to_string()))
            .and_then(CacheValue::as_task)
    }

    /// Resident task lists under `scope`, in insertion order.
    pub fn task_lists<'a>(
        &'a self,
        scope: &'a ViewScope,
    ) -> impl Iterator<Item = (&'a ViewSignature, &'a ViewSnapshot)> + 'a {
        self.entries.iter().filter_map(move |(key, value)| {
            let signature = key.signature().filter(|s| scope.contains(s))?;
            Some((signature, value.as_task_list()?))
        })
    }

    /// Keys of resident task lists under `scope`, in insertion order.
    pub fn task_list_keys(&self, scope: &ViewScope) -> Vec<CacheKey> {
        self.entries
            .keys()
            .filter(|key| key.is_task_list_in(scope))
            .cloned()
            .collect()
    }

    /// Number of keys carrying stamps, resident or held.
    pub fn meta_len(&self) -> usize {
        self.meta.len()
    }

    /// Resident project lists of a workspace.
    pub fn project_lists<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> impl Iterator<Item = &'a ProjectList> + 'a {
        self.entries.iter().filter_map(move |(key, value)| match key {
            CacheKey::ProjectList(ws) if ws == workspace_id => value.as_project_list(),
            _ => None,
        })
    }

    /// Resident member lists of a workspace.
    pub fn member_lists<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> impl Iterator<Item = &'a MemberList> + 'a {
        self.entries.iter().filter_map(move |(key, value)| match key {
            CacheKey::MemberList(ws) if ws == workspace_id => value.as_member_list(),
            _ => None,
        })
    }

    /// Returns `true` if a newer fetch or a mutation context has touched
    /// the ticket's key since the fetch was issued.
    pub fn is_fetch_superseded(&self, ticket: &FetchTicket) -> bool {
        let meta = self.meta(&ticket.key);
        meta.claimed > ticket.stamp
            || meta.fetch_issued > ticket.stamp
            || meta.fetch_cancelled > ticket.stamp
    }

    fn prune(&mut self, key: &CacheKey) {
        if self.entries.contains_key(key) {
            return;
        }
        if self.meta.get(key).is_some_and(|meta| !meta.is_held()) {
            self.meta.remove(key);
        }
    }
}

/// Write handle over the store state. Created by [`ViewStore::write`].
pub struct StoreTxn<'a> {
    state: &'a mut StoreState,
    events: Vec<StoreEvent>,
}

impl<'a> StoreTxn<'a> {
    fn new(state: &'a mut StoreState) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    /// Read access to the state as modified so far.
    pub fn state(&self) -> &StoreState {
        self.state
    }

    /// Draws a fresh stamp.
    pub fn next_stamp(&mut self) -> u64 {
        self.state.stamp += 1;
        self.state.stamp
    }

    /// Inserts or replaces `key`. Returns the write stamp.
    pub fn set(&mut self, key: CacheKey, value: CacheValue) -> u64 {
        let stamp = self.next_stamp();
        let meta = self.state.meta.entry(key.clone()).or_default();
        meta.written = stamp;
        meta.invalidated = false;
        self.state.entries.insert(key.clone(), value);
        self.events
            .push(StoreEvent::new(key, StoreEventKind::Updated, stamp));
        stamp
    }

    /// Removes `key`. Absent keys are a no-op and draw no stamp.
    pub fn remove(&mut self, key: &CacheKey) -> Option<(CacheValue, u64)> {
        let value = self.state.entries.shift_remove(key)?;
        let stamp = self.next_stamp();
        self.state.meta.entry(key.clone()).or_default().written = stamp;
        self.state.prune(key);
        self.events
            .push(StoreEvent::new(key.clone(), StoreEventKind::Removed, stamp));
        Some((value, stamp))
    }

    /// Records that the mutation context stamped `stamp` owns `key` from
    /// now on. Each claim holds the key until [`release`](Self::release).
    pub fn claim(&mut self, key: &CacheKey, stamp: u64) {
        let meta = self.state.meta.entry(key.clone()).or_default();
        meta.claimed = meta.claimed.max(stamp);
        meta.open_contexts += 1;
    }

    /// Drops one context hold on `key`.
    pub fn release(&mut self, key: &CacheKey) {
        if let Some(meta) = self.state.meta.get_mut(key) {
            meta.open_contexts = meta.open_contexts.saturating_sub(1);
        }
        self.state.prune(key);
    }

    /// Registers a fetch for `key` and returns its ticket. The key stays
    /// held until the ticket is passed to [`finish_fetch`](Self::finish_fetch).
    pub fn begin_fetch(&mut self, key: CacheKey) -> FetchTicket {
        let stamp = self.next_stamp();
        let meta = self.state.meta.entry(key.clone()).or_default();
        meta.fetch_issued = stamp;
        meta.pending_fetches += 1;
        FetchTicket { key, stamp }
    }

    /// Marks the fetch behind `ticket` as finished, whatever its outcome.
    pub fn finish_fetch(&mut self, ticket: &FetchTicket) {
        if let Some(meta) = self.state.meta.get_mut(&ticket.key) {
            meta.pending_fetches = meta.pending_fetches.saturating_sub(1);
        }
        self.state.prune(&ticket.key);
    }

    /// Cancels the in-flight fetches of every task list under `scope`.
    ///
    /// Their responses will be dropped as stale and the lists are marked
    /// invalidated so their owners fetch again. Returns the number of lists
    /// affected.
    pub fn cancel_fetches(&mut self, scope: &ViewScope) -> usize {
        let keys: Vec<CacheKey> = self
            .state
            .meta
            .iter()
            .filter(|(key, meta)| meta.pending_fetches > 0 && key.is_task_list_in(scope))
            .map(|(key, _)| key.clone())
            .collect();
        if keys.is_empty() {
            return 0;
        }
        let stamp = self.next_stamp();
        for key in &keys {
            self.state.meta.entry(key.clone()).or_default().fetch_cancelled = stamp;
            self.invalidate(key);
        }
        keys.len()
    }

    /// Marks `key` stale and notifies subscribers.
    ///
    /// Keys that are neither resident nor held only get the event, which is
    /// how fire-and-forget signals (analytics) are emitted.
    pub fn invalidate(&mut self, key: &CacheKey) {
        let stamp = self.state.stamp;
        let tracked = self.state.entries.contains_key(key)
            || self.state.meta.get(key).is_some_and(KeyMeta::is_held);
        if tracked {
            self.state.meta.entry(key.clone()).or_default().invalidated = true;
        }
        self.events.push(StoreEvent::new(
            key.clone(),
            StoreEventKind::Invalidated,
            stamp,
        ));
    }

    /// Marks every resident key accepted by `predicate` stale.
    pub fn invalidate_matching(&mut self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let keys: Vec<CacheKey> = self
            .state
            .entries
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        for key in &keys {
            self.invalidate(key);
        }
        keys.len()
    }

    fn into_events(self) -> Vec<StoreEvent> {
        self.events
    }
}

/// Keyed cache of task views, detail entries, and hydration lists.
///
/// A `ViewStore` is an explicit instance owned by its caller (a session, a
/// test harness, a per-connection actor) and shared as `Arc<ViewStore>`.
/// All access goes through one `parking_lot::RwLock`, so a multi-step
/// update performed inside [`write`](Self::write) is atomic with respect to
/// every other reader and writer.
pub struct ViewStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl fmt::Debug for ViewStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ViewStore")
            .field("entries", &state.len())
            .field("stamp", &state.stamp)
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore {
    /// Creates an empty store with the default event capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates an empty store whose event channel buffers `capacity`
    /// events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Runs `f` with shared access to the state.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.read())
    }

    /// Runs `f` as one atomic transaction, then publishes its events.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> R) -> R {
        let (result, events) = {
            let mut guard = self.state.write();
            let mut txn = StoreTxn::new(&mut guard);
            let result = f(&mut txn);
            (result, txn.into_events())
        };
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        result
    }

    /// Value under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.read(|state| state.get(key).cloned())
    }

    /// Inserts or replaces `key`.
    pub fn set(&self, key: CacheKey, value: CacheValue) {
        self.write(|txn| txn.set(key, value));
    }

    /// Evicts `key`.
    pub fn remove(&self, key: &CacheKey) -> Option<CacheValue> {
        self.write(|txn| txn.remove(key).map(|(value, _)| value))
    }

    /// Snapshot addressed by `signature`.
    pub fn get_task_list(&self, signature: &ViewSignature) -> Option<ViewSnapshot> {
        self.read(|state| state.task_list(signature).cloned())
    }

    /// Stores a task list.
    pub fn set_task_list(&self, signature: ViewSignature, snapshot: ViewSnapshot) {
        self.set(CacheKey::TaskList(signature), CacheValue::TaskList(snapshot));
    }

    /// Detail entry for `task_id`.
    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.read(|state| state.task(task_id).cloned())
    }

    /// Stores a detail entry.
    pub fn set_task(&self, task: Task) {
        self.set(CacheKey::Task(task.id.clone()), CacheValue::Task(task));
    }

    /// Stores the project list of a workspace.
    pub fn set_project_list(&self, workspace_id: impl Into<String>, list: ProjectList) {
        self.set(
            CacheKey::ProjectList(workspace_id.into()),
            CacheValue::ProjectList(list),
        );
    }

    /// Stores the member list of a workspace.
    pub fn set_member_list(&self, workspace_id: impl Into<String>, list: MemberList) {
        self.set(
            CacheKey::MemberList(workspace_id.into()),
            CacheValue::MemberList(list),
        );
    }

    /// Calls `f` for every resident task list under `scope`.
    pub fn for_each_matching(
        &self,
        scope: &ViewScope,
        mut f: impl FnMut(&ViewSignature, &ViewSnapshot),
    ) {
        self.read(|state| {
            for (signature, snapshot) in state.task_lists(scope) {
                f(signature, snapshot);
            }
        });
    }

    /// Marks `key` stale and notifies subscribers.
    pub fn invalidate(&self, key: &CacheKey) {
        self.write(|txn| txn.invalidate(key));
    }

    /// Returns `true` if `key` was invalidated and not rewritten since.
    pub fn is_invalidated(&self, key: &CacheKey) -> bool {
        self.read(|state| state.meta(key).invalidated)
    }

    /// Registers a fetch for `key`.
    pub fn begin_fetch(&self, key: CacheKey) -> FetchTicket {
        self.write(|txn| txn.begin_fetch(key))
    }

    /// Ends a fetch registered with [`begin_fetch`](Self::begin_fetch)
    /// without storing anything.
    pub fn finish_fetch(&self, ticket: &FetchTicket) {
        self.write(|txn| txn.finish_fetch(ticket));
    }

    /// Deep copy of every resident entry.
    pub fn snapshot(&self) -> IndexMap<CacheKey, CacheValue> {
        self.read(|state| state.entries.clone())
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.read(StoreState::len)
    }

    /// Returns `true` if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.read(StoreState::is_empty)
    }
}
