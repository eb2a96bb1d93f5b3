use crate::error::Result;
use crate::filter;
use crate::hydrate::hydrate;
use crate::store::StoreState;
use crate::types::{apply_patch, CacheKey, CacheValue, Task, TaskPatch, ViewScope};

use super::{
    invalidate_analytics, reconcile_detail, reconcile_views, MutationContext, MutationCoordinator,
    MutationKind,
};

impl MutationCoordinator {
    /// Applies a partial update to a task.
    ///
    /// Every view holding the task gets the patched, re-hydrated copy, or
    /// loses it when it no longer matches. Views that only start matching
    /// are filled once the server confirms.
    pub async fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task> {
        let detail_key = CacheKey::task(task_id);

        let (context, before) = self.store.write(|txn| {
            let mut context =
                MutationContext::begin(txn, MutationKind::Update, vec![task_id.to_string()]);
            let before = locate(txn.state(), task_id);
            let Some(scope) = before
                .as_ref()
                .map(|task| ViewScope::workspace(task.workspace_id.clone()))
            else {
                return (context, before);
            };
            txn.cancel_fetches(&scope);

            for key in txn.state().task_list_keys(&scope) {
                let (Some(signature), Some(mut snapshot)) = (
                    key.signature().cloned(),
                    txn.state().get(&key).and_then(CacheValue::as_task_list).cloned(),
                ) else {
                    continue;
                };
                let Some(index) = snapshot.position_of(task_id) else {
                    continue;
                };
                let patched = hydrate(txn.state(), apply_patch(&snapshot.documents[index], &patch));
                if filter::matches(&patched, &signature) {
                    snapshot.documents[index] = patched;
                } else {
                    snapshot.remove_at(index);
                }
                context.write(txn, key, CacheValue::TaskList(snapshot));
            }

            if let Some(current) = txn.state().task(task_id).cloned() {
                let patched = hydrate(txn.state(), apply_patch(&current, &patch));
                context.write(txn, detail_key.clone(), CacheValue::Task(patched));
            }
            (context, before)
        });

        tracing::debug!(
            task_id,
            views = context.written_keys().count(),
            "optimistic update applied"
        );

        let server = match self.remote.update_task(task_id, &patch).await {
            Ok(server) => server,
            Err(error) => return self.fail(context, Some(task_id), error),
        };

        let task = self.store.write(|txn| {
            let task = hydrate(txn.state(), server);
            reconcile_views(txn, &context, &task, None);
            reconcile_detail(txn, &context, &task);
            let previous_project = before.as_ref().map(|t| t.project_id.as_str());
            invalidate_analytics(
                txn,
                &task.workspace_id,
                [Some(task.project_id.as_str()), previous_project]
                    .into_iter()
                    .flatten(),
            );
            context.discard(txn);
            task
        });

        tracing::debug!(task_id, "update reconciled");
        self.publish(
            MutationKind::Update,
            Some(task_id),
            true,
            format!("task {} updated", task.name),
        );
        Ok(task)
    }
}

/// The cached copy of `task_id`: the detail entry, else the first view
/// holding it.
pub(super) fn locate(state: &StoreState, task_id: &str) -> Option<Task> {
    state.task(task_id).cloned().or_else(|| {
        state
            .task_lists(&ViewScope::AllTasks)
            .find_map(|(_, snapshot)| {
                snapshot
                    .position_of(task_id)
                    .map(|index| snapshot.documents[index].clone())
            })
    })
}
