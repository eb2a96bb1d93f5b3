use std::collections::HashMap;

use crate::error::{Result, SyncError};
use crate::filter;
use crate::types::{BulkTaskUpdate, BulkUpdateAck, CacheKey, CacheValue, ViewScope};

use super::update::locate;
use super::{invalidate_analytics, MutationContext, MutationCoordinator, MutationKind};

impl MutationCoordinator {
    /// Moves many tasks at once (kanban drag and drop).
    ///
    /// Each task gets its new status and position in every view and detail
    /// entry. Tasks that stop matching a view leave it. One remote call; on
    /// failure every view and detail entry is restored in one transaction.
    pub async fn bulk_update_tasks(&self, updates: Vec<BulkTaskUpdate>) -> Result<BulkUpdateAck> {
        if updates.is_empty() {
            return Err(SyncError::InvalidInput(
                "bulk update needs at least one task".to_string(),
            ));
        }

        let by_id: HashMap<&str, &BulkTaskUpdate> = updates
            .iter()
            .map(|update| (update.id.as_str(), update))
            .collect();
        let task_ids: Vec<String> = updates.iter().map(|update| update.id.clone()).collect();

        let (context, projects) = self.store.write(|txn| {
            let mut context =
                MutationContext::begin(txn, MutationKind::BulkUpdate, task_ids.clone());
            let mut projects: Vec<String> = Vec::new();
            let mut workspaces: Vec<String> = Vec::new();
            for task in task_ids.iter().filter_map(|id| locate(txn.state(), id)) {
                if !workspaces.contains(&task.workspace_id) {
                    workspaces.push(task.workspace_id);
                }
            }
            let mut keys: Vec<CacheKey> = Vec::new();
            for workspace_id in workspaces {
                let scope = ViewScope::workspace(workspace_id);
                txn.cancel_fetches(&scope);
                keys.extend(txn.state().task_list_keys(&scope));
            }

            for key in keys {
                let (Some(signature), Some(mut snapshot)) = (
                    key.signature().cloned(),
                    txn.state().get(&key).and_then(CacheValue::as_task_list).cloned(),
                ) else {
                    continue;
                };
                if !snapshot.documents.iter().any(|t| by_id.contains_key(t.id.as_str())) {
                    continue;
                }

                let mut dropped = 0u64;
                snapshot.documents.retain_mut(|task| {
                    let Some(update) = by_id.get(task.id.as_str()) else {
                        return true;
                    };
                    if !projects.contains(&task.project_id) {
                        projects.push(task.project_id.clone());
                    }
                    task.status = update.status;
                    task.position = update.position;
                    let keep = filter::matches(task, &signature);
                    if !keep {
                        dropped += 1;
                    }
                    keep
                });
                snapshot.total = snapshot.total.saturating_sub(dropped);
                context.write(txn, key, CacheValue::TaskList(snapshot));
            }

            for update in &updates {
                let Some(mut task) = txn.state().task(&update.id).cloned() else {
                    continue;
                };
                task.status = update.status;
                task.position = update.position;
                context.write(txn, CacheKey::task(update.id.clone()), CacheValue::Task(task));
            }
            (context, projects)
        });

        tracing::debug!(
            tasks = updates.len(),
            views = context.written_keys().count(),
            "optimistic bulk update applied"
        );

        let ack = match self.remote.bulk_update_tasks(&updates).await {
            Ok(ack) => ack,
            Err(error) => return self.fail(context, None, error),
        };

        self.store.write(|txn| {
            invalidate_analytics(txn, &ack.workspace_id, projects.iter().map(String::as_str));
            txn.invalidate_matching(|key| matches!(key, CacheKey::ProjectAnalytics(_)));
            context.discard(txn);
        });

        tracing::debug!(tasks = updates.len(), "bulk update reconciled");
        self.publish(
            MutationKind::BulkUpdate,
            None,
            true,
            format!("{} tasks updated", updates.len()),
        );
        Ok(ack)
    }
}
