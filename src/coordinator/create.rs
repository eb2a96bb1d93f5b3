use chrono::Utc;

use crate::error::Result;
use crate::filter;
use crate::hydrate::hydrate;
use crate::position::next_position;
use crate::types::{CacheValue, CreateTaskRequest, Task, ViewScope};

use super::{
    invalidate_analytics, reconcile_detail, reconcile_views, MutationContext, MutationCoordinator,
    MutationKind,
};

impl MutationCoordinator {
    /// Creates a task.
    ///
    /// A provisional task with a temporary id is prepended to every resident
    /// view of the workspace it matches, then replaced by the server copy
    /// once the create succeeds.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`](crate::SyncError::InvalidInput) if a
    /// required field is blank (nothing is applied), or the remote error
    /// after the views have been restored.
    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<Task> {
        request.validate()?;

        let temp_id = self.temp_id();
        let scope = ViewScope::workspace(request.workspace_id.clone());
        let now = Utc::now().to_rfc3339();
        let step = self.config.position_step;

        let (context, provisional) = self.store.write(|txn| {
            let position = next_position(
                txn.state(),
                &request.workspace_id,
                request.status,
                step,
            );
            let provisional = hydrate(
                txn.state(),
                request.to_provisional(temp_id.clone(), position, &now),
            );

            let mut context = MutationContext::begin(txn, MutationKind::Create, Vec::new())
                .with_temp_id(temp_id.clone());
            txn.cancel_fetches(&scope);

            for key in txn.state().task_list_keys(&scope) {
                let (Some(signature), Some(mut snapshot)) = (
                    key.signature().cloned(),
                    txn.state().get(&key).and_then(CacheValue::as_task_list).cloned(),
                ) else {
                    continue;
                };
                if !filter::matches(&provisional, &signature) || snapshot.contains(&temp_id) {
                    continue;
                }
                let limit = snapshot.effective_limit(&signature);
                snapshot.prepend(provisional.clone(), limit);
                context.write(txn, key, CacheValue::TaskList(snapshot));
            }
            (context, provisional)
        });

        tracing::debug!(
            task_id = %temp_id,
            workspace_id = %request.workspace_id,
            position = provisional.position,
            views = context.written_keys().count(),
            "optimistic create applied"
        );

        let server = match self.remote.create_task(&request).await {
            Ok(server) => server,
            Err(error) => return self.fail(context, Some(&temp_id), error),
        };

        let task = self.store.write(|txn| {
            let task = hydrate(txn.state(), provisional.merged_with(server));
            reconcile_views(txn, &context, &task, Some(&temp_id));
            reconcile_detail(txn, &context, &task);
            invalidate_analytics(txn, &task.workspace_id, [task.project_id.as_str()]);
            context.discard(txn);
            task
        });

        tracing::debug!(task_id = %task.id, temp_id = %temp_id, "create reconciled");
        self.publish(
            MutationKind::Create,
            Some(&task.id),
            true,
            format!("task {} created", task.name),
        );
        Ok(task)
    }
}
