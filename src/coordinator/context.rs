//! Mutation contexts: the undo log of one in-flight mutation.
//!
//! A [`MutationContext`] is opened inside the same store transaction that
//! applies the optimistic edit. It claims the detail key of each task it
//! touches, and the first time it writes or removes any other key it claims
//! that key and copies its current value, then records the stamp of the
//! write. Keys it never writes are left alone, so mutations on unrelated
//! views or tasks do not supersede each other. It is consumed exactly
//! once, by [`discard`](MutationContext::discard) on success or by
//! [`rollback`](MutationContext::rollback) on failure, and either way it
//! releases its claims.
//!
//! # Rollback
//!
//! For each key the mutation wrote:
//!
//! - If nobody wrote the key since, the copied value is restored verbatim
//!   (or the key removed, if it did not exist before).
//! - If another party wrote it, only the documents this mutation touched
//!   are reverted to their copied versions, `total` is adjusted, and the key
//!   is marked invalidated. Detail entries are only invalidated.
//! - If the key is gone, nothing happens.

use std::fmt;

use crate::store::{StoreState, StoreTxn};
use crate::types::{CacheKey, CacheValue, ViewSnapshot};

/// Which mutation a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Task creation.
    Create,
    /// Partial task update.
    Update,
    /// Task deletion.
    Delete,
    /// Kanban bulk reorder.
    BulkUpdate,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkUpdate => "bulk_update",
        })
    }
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    key: CacheKey,
    previous: Option<CacheValue>,
    written: Option<u64>,
}

/// What a rollback did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Keys restored verbatim.
    pub restored: usize,
    /// Keys reverted document by document because of a concurrent write.
    pub reverted: usize,
    /// Keys only marked invalidated.
    pub invalidated: usize,
}

/// Undo log of one mutation.
#[derive(Debug, Clone)]
pub struct MutationContext {
    stamp: u64,
    kind: MutationKind,
    temp_id: Option<String>,
    task_ids: Vec<String>,
    entries: Vec<SnapshotEntry>,
}

impl MutationContext {
    /// Opens a context claiming the detail key of every task in
    /// `task_ids`. View keys are only claimed when first written.
    pub fn begin(txn: &mut StoreTxn<'_>, kind: MutationKind, task_ids: Vec<String>) -> Self {
        let mut context = Self {
            stamp: txn.next_stamp(),
            kind,
            temp_id: None,
            task_ids,
            entries: Vec::new(),
        };
        for id in context.task_ids.clone() {
            context.track(txn, &CacheKey::task(id));
        }
        context
    }

    /// Records the temporary id of a pending create.
    pub fn with_temp_id(mut self, temp_id: impl Into<String>) -> Self {
        self.temp_id = Some(temp_id.into());
        self
    }

    /// Stamp drawn when the context was opened.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Mutation kind.
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Temporary id, for creates.
    pub fn temp_id(&self) -> Option<&str> {
        self.temp_id.as_deref()
    }

    /// Ids of the tasks the mutation touches.
    pub fn task_ids(&self) -> &[String] {
        &self.task_ids
    }

    /// Keys the mutation wrote during its optimistic step.
    pub fn written_keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries
            .iter()
            .filter(|entry| entry.written.is_some())
            .map(|entry| &entry.key)
    }

    /// Returns `true` if a newer context has claimed `key`.
    pub fn is_superseded(&self, state: &StoreState, key: &CacheKey) -> bool {
        state.meta(key).claimed > self.stamp
    }

    /// Returns `true` if a newer context has touched the task `task_id`.
    pub fn is_task_superseded(&self, state: &StoreState, task_id: &str) -> bool {
        self.is_superseded(state, &CacheKey::task(task_id))
    }

    /// Writes `value` under `key` as part of the optimistic step.
    pub fn write(&mut self, txn: &mut StoreTxn<'_>, key: CacheKey, value: CacheValue) {
        let index = self.track(txn, &key);
        let stamp = txn.set(key, value);
        self.entries[index].written = Some(stamp);
    }

    /// Removes `key` as part of the optimistic step.
    pub fn remove(&mut self, txn: &mut StoreTxn<'_>, key: &CacheKey) {
        let index = self.track(txn, key);
        if let Some((_, stamp)) = txn.remove(key) {
            self.entries[index].written = Some(stamp);
        }
    }

    /// Closes the context after a successful remote call.
    pub fn discard(self, txn: &mut StoreTxn<'_>) {
        for entry in &self.entries {
            txn.release(&entry.key);
        }
    }

    /// Undoes the optimistic step. See the module docs for the policy.
    pub fn rollback(self, txn: &mut StoreTxn<'_>) -> RollbackReport {
        let mut report = RollbackReport::default();
        let touched = self.touched_ids();

        let claimed: Vec<CacheKey> = self.entries.iter().map(|entry| entry.key.clone()).collect();

        for entry in self.entries {
            let Some(written) = entry.written else {
                continue;
            };

            if txn.state().meta(&entry.key).written == written {
                match entry.previous {
                    Some(previous) => {
                        txn.set(entry.key, previous);
                    }
                    None => {
                        txn.remove(&entry.key);
                    }
                }
                report.restored += 1;
                continue;
            }

            let Some(current) = txn.state().get(&entry.key).cloned() else {
                continue;
            };

            match (current, entry.previous) {
                (CacheValue::TaskList(current), previous) => {
                    let previous = previous.as_ref().and_then(CacheValue::as_task_list);
                    let reverted = revert_documents(current, previous, &touched);
                    txn.set(entry.key.clone(), CacheValue::TaskList(reverted));
                    txn.invalidate(&entry.key);
                    report.reverted += 1;
                }
                _ => {
                    txn.invalidate(&entry.key);
                    report.invalidated += 1;
                }
            }
        }
        for key in &claimed {
            txn.release(key);
        }
        report
    }

    fn touched_ids(&self) -> Vec<String> {
        let mut ids = self.task_ids.clone();
        if let Some(temp_id) = &self.temp_id {
            ids.push(temp_id.clone());
        }
        ids
    }

    fn track(&mut self, txn: &mut StoreTxn<'_>, key: &CacheKey) -> usize {
        if let Some(index) = self.entries.iter().position(|entry| entry.key == *key) {
            return index;
        }
        txn.claim(key, self.stamp);
        self.entries.push(SnapshotEntry {
            key: key.clone(),
            previous: txn.state().get(key).cloned(),
            written: None,
        });
        self.entries.len() - 1
    }
}

/// Reverts the documents named in `touched` inside `current` to their
/// versions in `previous`, leaving every other document alone.
fn revert_documents(
    mut current: ViewSnapshot,
    previous: Option<&ViewSnapshot>,
    touched: &[String],
) -> ViewSnapshot {
    for id in touched {
        let before = previous.and_then(|snapshot| {
            snapshot
                .position_of(id)
                .map(|index| (index, snapshot.documents[index].clone()))
        });
        match (before, current.position_of(id)) {
            (Some((_, task)), Some(index)) => current.documents[index] = task,
            (Some((index, task)), None) => {
                let index = index.min(current.documents.len());
                current.documents.insert(index, task);
                current.total += 1;
            }
            (None, Some(index)) => {
                current.remove_at(index);
            }
            (None, None) => {}
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ViewStore;
    use crate::types::{Task, TaskStatus, ViewSignature};
    use pretty_assertions::assert_eq;

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.into(),
            name: id.into(),
            status,
            assignee_id: "m1".into(),
            project_id: "p1".into(),
            workspace_id: "w1".into(),
            position: 1000.0,
            due_date: "2025-01-01".into(),
            description: None,
            project: None,
            assignee: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn seeded() -> (ViewStore, CacheKey) {
        let store = ViewStore::new();
        let signature = ViewSignature::workspace("w1");
        store.set_task_list(
            signature.clone(),
            ViewSnapshot::new(vec![task("a", TaskStatus::Todo), task("b", TaskStatus::Todo)]),
        );
        (store, CacheKey::tasks(signature))
    }

    fn remove_doc(context: &mut MutationContext, txn: &mut StoreTxn<'_>, key: &CacheKey, id: &str) {
        let mut snapshot = txn.state().get(key).unwrap().as_task_list().unwrap().clone();
        snapshot.remove(id);
        context.write(txn, key.clone(), CacheValue::TaskList(snapshot));
    }

    #[test]
    fn uncontended_rollback_is_exact() {
        let (store, key) = seeded();
        let before = store.snapshot();

        let context = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Delete, vec!["a".into()]);
            remove_doc(&mut context, txn, &key, "a");
            context.remove(txn, &CacheKey::task("a"));
            context
        });
        assert_ne!(store.snapshot(), before);

        let report = store.write(|txn| context.rollback(txn));
        assert_eq!(report.restored, 1);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn contended_rollback_keeps_foreign_edits() {
        let (store, key) = seeded();

        let context = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Delete, vec!["a".into()]);
            remove_doc(&mut context, txn, &key, "a");
            context
        });

        // Another writer renames "b" while the delete is in flight.
        store.write(|txn| {
            let mut snapshot = txn.state().get(&key).unwrap().as_task_list().unwrap().clone();
            snapshot.documents[0].name = "renamed".into();
            txn.set(key.clone(), CacheValue::TaskList(snapshot));
        });

        let report = store.write(|txn| context.rollback(txn));
        assert_eq!(report.reverted, 1);

        let snapshot = store.get(&key).unwrap().as_task_list().unwrap().clone();
        let ids: Vec<&str> = snapshot.documents.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(snapshot.documents[1].name, "renamed");
        assert_eq!(snapshot.total, 2);
        assert!(store.is_invalidated(&key));
    }

    #[test]
    fn evicted_target_is_a_no_op() {
        let (store, key) = seeded();
        let context = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Delete, vec!["a".into()]);
            remove_doc(&mut context, txn, &key, "a");
            context
        });
        store.remove(&key);

        let report = store.write(|txn| context.rollback(txn));
        assert_eq!(report, RollbackReport::default());
        assert!(store.is_empty());
    }

    #[test]
    fn newer_context_supersedes_older_only_on_written_keys() {
        let (store, key) = seeded();
        let other = CacheKey::tasks(ViewSignature::workspace("w2"));
        store.set_task_list(ViewSignature::workspace("w2"), ViewSnapshot::default());

        let mut first = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Update, vec!["a".into()]);
            remove_doc(&mut context, txn, &key, "a");
            context
        });
        let second = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Update, vec!["b".into()]);
            remove_doc(&mut context, txn, &key, "b");
            context
        });
        store.read(|state| {
            assert!(first.is_superseded(state, &key));
            assert!(!second.is_superseded(state, &key));
            assert!(!first.is_superseded(state, &other));
            assert!(!first.is_task_superseded(state, "a"));
            assert_eq!(state.meta(&key).open_contexts, 2);
        });

        store.write(|txn| {
            first.write(txn, other.clone(), CacheValue::TaskList(ViewSnapshot::default()));
            first.discard(txn);
            second.discard(txn);
        });
        store.read(|state| {
            assert_eq!(state.meta(&key).open_contexts, 0);
            assert_eq!(state.meta(&other).open_contexts, 0);
        });
    }

    #[test]
    fn rollback_restores_removed_detail_and_drops_holds() {
        let store = ViewStore::new();
        let key = CacheKey::task("a");
        store.set_task(task("a", TaskStatus::Todo));
        let before = store.snapshot();

        let context = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Delete, vec!["a".into()]);
            context.remove(txn, &key);
            context
        });
        assert!(store.is_empty());

        let report = store.write(|txn| context.rollback(txn));
        assert_eq!(report.restored, 1);
        assert_eq!(store.snapshot(), before);
        store.read(|state| assert_eq!(state.meta(&key).open_contexts, 0));
    }
}
