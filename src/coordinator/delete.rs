use crate::error::Result;
use crate::types::{CacheKey, CacheValue, DeletedTask, ViewScope};

use super::update::locate;
use super::{invalidate_analytics, MutationContext, MutationCoordinator, MutationKind};

impl MutationCoordinator {
    /// Deletes a task.
    ///
    /// The task leaves every view and the detail entry immediately; `total`
    /// only drops in views that actually held it. A failed delete puts
    /// everything back, detail entry included.
    pub async fn delete_task(&self, task_id: &str) -> Result<DeletedTask> {
        let detail_key = CacheKey::task(task_id);

        let (context, before) = self.store.write(|txn| {
            let mut context =
                MutationContext::begin(txn, MutationKind::Delete, vec![task_id.to_string()]);
            let before = locate(txn.state(), task_id);
            if let Some(task) = &before {
                let scope = ViewScope::workspace(task.workspace_id.clone());
                txn.cancel_fetches(&scope);
                for key in txn.state().task_list_keys(&scope) {
                    let Some(mut snapshot) =
                        txn.state().get(&key).and_then(CacheValue::as_task_list).cloned()
                    else {
                        continue;
                    };
                    if snapshot.remove(task_id).is_some() {
                        context.write(txn, key, CacheValue::TaskList(snapshot));
                    }
                }
            }
            context.remove(txn, &detail_key);
            (context, before)
        });

        tracing::debug!(
            task_id,
            views = context.written_keys().count(),
            "optimistic delete applied"
        );

        let deleted = match self.remote.delete_task(task_id).await {
            Ok(deleted) => deleted,
            Err(error) => return self.fail(context, Some(task_id), error),
        };

        self.store.write(|txn| {
            // Views fetched while the delete was in flight may still hold it.
            if !context.is_task_superseded(txn.state(), &deleted.id) {
                let scope = ViewScope::workspace(deleted.workspace_id.clone());
                for key in txn.state().task_list_keys(&scope) {
                    let Some(mut snapshot) =
                        txn.state().get(&key).and_then(CacheValue::as_task_list).cloned()
                    else {
                        continue;
                    };
                    if snapshot.remove(&deleted.id).is_some() {
                        txn.set(key, CacheValue::TaskList(snapshot));
                    }
                }
                txn.remove(&detail_key);
            }
            let previous_project = before.as_ref().map(|t| t.project_id.as_str());
            invalidate_analytics(
                txn,
                &deleted.workspace_id,
                [Some(deleted.project_id.as_str()), previous_project]
                    .into_iter()
                    .flatten(),
            );
            context.discard(txn);
        });

        tracing::debug!(task_id, "delete reconciled");
        self.publish(
            MutationKind::Delete,
            Some(task_id),
            true,
            "task deleted".to_string(),
        );
        Ok(deleted)
    }
}
