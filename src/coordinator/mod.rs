//! Mutation coordinator: optimistic apply, remote call, reconcile or roll
//! back.
//!
//! Each mutation runs through the same lifecycle:
//!
//! 1. One store transaction opens a [`MutationContext`], cancels in-flight
//!    list fetches of the workspace, and applies the optimistic edit. The
//!    context claims the tasks it touches and every key it writes.
//! 2. The remote call is awaited. This is the only suspension point.
//! 3. On success a second transaction merges the server's answer into the
//!    views of the task's workspace. If a newer mutation touched the same
//!    task meanwhile, views holding it are invalidated instead.
//! 4. On failure a transaction replays the context (see
//!    [`MutationContext::rollback`]).
//!
//! Settled mutations publish a [`MutationOutcome`] for user-facing
//! notifications.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use taskboard_sync::{
//!     CreateTaskRequest, InMemoryTaskApi, MutationCoordinator, TaskStatus, ViewSignature,
//!     ViewSnapshot, ViewStore,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(ViewStore::new());
//! let board = ViewSignature::workspace("w1");
//! store.set_task_list(board.clone(), ViewSnapshot::default());
//!
//! let coordinator = MutationCoordinator::new(store.clone(), Arc::new(InMemoryTaskApi::new()));
//! let task = coordinator
//!     .create_task(CreateTaskRequest {
//!         name: "Ship it".into(),
//!         status: TaskStatus::Todo,
//!         assignee_id: "m1".into(),
//!         project_id: "p1".into(),
//!         workspace_id: "w1".into(),
//!         due_date: "2025-01-31".into(),
//!         description: None,
//!     })
//!     .await
//!     .unwrap();
//!
//! let view = store.get_task_list(&board).unwrap();
//! assert_eq!(view.documents[0].id, task.id);
//! assert_eq!(view.total, 1);
//! # });
//! ```

mod bulk;
pub mod context;
mod create;
mod delete;
mod fetch;
mod update;

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::filter;
use crate::hydrate::hydrate;
use crate::remote::RemoteTaskApi;
use crate::store::{StoreTxn, ViewStore};
use crate::types::{CacheKey, CacheValue, Task, ViewScope};

pub use context::{MutationContext, MutationKind, RollbackReport};

/// A settled mutation, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Which mutation settled.
    pub kind: MutationKind,
    /// The task concerned, when there is exactly one.
    pub task_id: Option<String>,
    /// `true` if the server accepted the mutation.
    pub succeeded: bool,
    /// Short human-readable summary.
    pub message: String,
}

/// Orchestrates task mutations against a [`ViewStore`] and a
/// [`RemoteTaskApi`].
///
/// The coordinator is cheap to share behind an `Arc`; it holds no state of
/// its own beyond configuration and the outcome channel.
pub struct MutationCoordinator {
    store: Arc<ViewStore>,
    remote: Arc<dyn RemoteTaskApi>,
    config: SyncConfig,
    outcomes: broadcast::Sender<MutationOutcome>,
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MutationCoordinator {
    /// Creates a coordinator with the default configuration.
    pub fn new(store: Arc<ViewStore>, remote: Arc<dyn RemoteTaskApi>) -> Self {
        Self::with_config(store, remote, SyncConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    pub fn with_config(
        store: Arc<ViewStore>,
        remote: Arc<dyn RemoteTaskApi>,
        config: SyncConfig,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            store,
            remote,
            config,
            outcomes,
        }
    }

    /// The store this coordinator writes to.
    pub fn store(&self) -> &Arc<ViewStore> {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Subscribes to settled-mutation notifications.
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<MutationOutcome> {
        self.outcomes.subscribe()
    }

    /// Next free position at the end of a lane, using the configured step.
    pub fn next_position(&self, workspace_id: &str, status: crate::types::TaskStatus) -> f64 {
        self.store
            .next_position(workspace_id, status, self.config.position_step)
    }

    fn temp_id(&self) -> String {
        format!("{}{}", self.config.temp_id_prefix, Uuid::new_v4())
    }

    fn publish(&self, kind: MutationKind, task_id: Option<&str>, succeeded: bool, message: String) {
        let _ = self.outcomes.send(MutationOutcome {
            kind,
            task_id: task_id.map(str::to_string),
            succeeded,
            message,
        });
    }

    /// Settles a failed remote call.
    ///
    /// Rejections and network failures roll the context back. Any other
    /// error leaves the optimistic state in place but invalidates every key
    /// the mutation wrote, since the server may or may not have applied it.
    fn fail<T>(&self, context: MutationContext, task_id: Option<&str>, error: SyncError) -> Result<T> {
        let kind = context.kind();
        if error.triggers_rollback() {
            let report = self.store.write(|txn| context.rollback(txn));
            tracing::warn!(
                mutation = %kind,
                task_id = task_id.unwrap_or_default(),
                error = %error,
                restored = report.restored,
                reverted = report.reverted,
                "mutation failed; rolled back"
            );
        } else {
            self.store.write(|txn| {
                for key in context.written_keys() {
                    txn.invalidate(key);
                }
                context.discard(txn);
            });
            tracing::warn!(
                mutation = %kind,
                task_id = task_id.unwrap_or_default(),
                error = %error,
                "mutation outcome unknown; views invalidated"
            );
        }
        self.publish(kind, task_id, false, error.to_string());
        Err(error)
    }
}

/// Merges an authoritative task into every task list of its workspace.
///
/// `local_id` is the id the task is known under locally (a temporary id for
/// creates). When a newer mutation touched the same task, views holding it
/// only get the id rename (or lose the row if the server copy does not
/// match) and are invalidated.
fn reconcile_views(
    txn: &mut StoreTxn<'_>,
    context: &MutationContext,
    task: &Task,
    local_id: Option<&str>,
) {
    let scope = ViewScope::workspace(task.workspace_id.clone());
    let superseded = context.is_task_superseded(txn.state(), &task.id)
        || local_id.is_some_and(|id| context.is_task_superseded(txn.state(), id));
    for key in txn.state().task_list_keys(&scope) {
        let (Some(signature), Some(mut snapshot)) = (
            key.signature().cloned(),
            txn.state().get(&key).and_then(CacheValue::as_task_list).cloned(),
        ) else {
            continue;
        };

        let existing = local_id
            .and_then(|id| snapshot.position_of(id))
            .or_else(|| snapshot.position_of(&task.id));

        if superseded {
            let Some(index) = existing else {
                continue;
            };
            if !filter::matches(task, &signature) {
                snapshot.remove_at(index);
                txn.set(key.clone(), CacheValue::TaskList(snapshot));
            } else if local_id.is_some() {
                snapshot.documents[index].id = task.id.clone();
                txn.set(key.clone(), CacheValue::TaskList(snapshot));
            }
            tracing::debug!(key = %key, task_id = %task.id, "task touched by newer mutation; invalidating");
            txn.invalidate(&key);
            continue;
        }

        let belongs = filter::matches(task, &signature);
        match (existing, belongs) {
            (Some(index), true) => {
                let merged = snapshot.documents[index].merged_with(task.clone());
                snapshot.documents[index] = hydrate(txn.state(), merged);
            }
            (Some(index), false) => {
                snapshot.remove_at(index);
            }
            (None, true) => {
                let limit = snapshot.effective_limit(&signature);
                snapshot.prepend(hydrate(txn.state(), task.clone()), limit);
            }
            (None, false) => continue,
        }
        txn.set(key, CacheValue::TaskList(snapshot));
    }
}

/// Writes or merges the detail entry of `task`.
fn reconcile_detail(txn: &mut StoreTxn<'_>, context: &MutationContext, task: &Task) {
    let key = CacheKey::task(task.id.clone());
    if context.is_superseded(txn.state(), &key) {
        txn.invalidate(&key);
        return;
    }
    let merged = match txn.state().task(&task.id) {
        Some(current) => current.merged_with(task.clone()),
        None => task.clone(),
    };
    let hydrated = hydrate(txn.state(), merged);
    txn.set(key, CacheValue::Task(hydrated));
}

/// Emits the analytics invalidation signals for a workspace and projects.
fn invalidate_analytics<'a>(
    txn: &mut StoreTxn<'_>,
    workspace_id: &str,
    project_ids: impl IntoIterator<Item = &'a str>,
) {
    txn.invalidate(&CacheKey::WorkspaceAnalytics(workspace_id.to_string()));
    let mut seen: Vec<&str> = Vec::new();
    for project_id in project_ids {
        if project_id.is_empty() || seen.contains(&project_id) {
            continue;
        }
        seen.push(project_id);
        txn.invalidate(&CacheKey::ProjectAnalytics(project_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskStatus, ViewSignature, ViewSnapshot};
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
            due_date: "2025-01-31".into(),
            description: None,
            project: None,
            assignee: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Opens a create holding `temp-1` in the todo view, then a newer
    /// mutation on the same pending row.
    fn contested_create(store: &ViewStore, todo: &ViewSignature) -> (MutationContext, MutationContext) {
        store.set_task_list(todo.clone(), ViewSnapshot::default());
        let key = CacheKey::tasks(todo.clone());
        let create = store.write(|txn| {
            let mut context = MutationContext::begin(txn, MutationKind::Create, Vec::new())
                .with_temp_id("temp-1");
            let mut snapshot = ViewSnapshot::default();
            snapshot.prepend(task("temp-1", TaskStatus::Todo), None);
            context.write(txn, key, CacheValue::TaskList(snapshot));
            context
        });
        let newer = store
            .write(|txn| MutationContext::begin(txn, MutationKind::Update, vec!["temp-1".into()]));
        (create, newer)
    }

    #[test]
    fn superseded_reconcile_drops_row_the_server_copy_does_not_match() {
        let store = ViewStore::new();
        let todo = ViewSignature::workspace("w1").with_statuses(&[TaskStatus::Todo]);
        let (create, newer) = contested_create(&store, &todo);

        store.write(|txn| {
            reconcile_views(txn, &create, &task("t9", TaskStatus::Done), Some("temp-1"));
            create.discard(txn);
            newer.discard(txn);
        });

        let view = store.get_task_list(&todo).unwrap();
        assert!(view.documents.is_empty());
        assert_eq!(view.total, 0);
        assert!(store.is_invalidated(&CacheKey::tasks(todo)));
    }

    #[test]
    fn superseded_reconcile_renames_matching_row() {
        let store = ViewStore::new();
        let todo = ViewSignature::workspace("w1").with_statuses(&[TaskStatus::Todo]);
        let (create, newer) = contested_create(&store, &todo);

        store.write(|txn| {
            reconcile_views(txn, &create, &task("t9", TaskStatus::Todo), Some("temp-1"));
            create.discard(txn);
            newer.discard(txn);
        });

        let view = store.get_task_list(&todo).unwrap();
        assert_eq!(view.documents.len(), 1);
        assert_eq!(view.documents[0].id, "t9");
        assert!(store.is_invalidated(&CacheKey::tasks(todo)));
        store.read(|state| assert_eq!(state.meta_len(), state.len()));
    }
}
