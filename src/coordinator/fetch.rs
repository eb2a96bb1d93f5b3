use crate::error::{Result, SyncError};
use crate::hydrate::hydrate;
use crate::remote::TaskQuery;
use crate::store::{FetchTicket, StoreTxn};
use crate::types::{
    CacheKey, CacheValue, MemberList, ProjectList, Task, ViewScope, ViewSignature, ViewSnapshot,
};

use super::MutationCoordinator;

impl MutationCoordinator {
    /// Loads a task list from the server and stores it under `signature`.
    ///
    /// Documents are hydrated before they are stored.
    ///
    /// # Errors
    ///
    /// [`SyncError::StaleReconciliation`] if a newer fetch for the same view
    /// was issued, or a mutation on the view's workspace started, while this
    /// one was in flight. The response is dropped and the store is left untouched.
    pub async fn fetch_tasks(&self, signature: &ViewSignature) -> Result<ViewSnapshot> {
        let ticket = self.store.begin_fetch(CacheKey::tasks(signature.clone()));
        let result = self
            .remote
            .list_tasks(&TaskQuery::from(signature))
            .await
            .inspect_err(|error| {
                tracing::warn!(view = %signature, error = %error, "task list fetch failed");
            });

        self.store.write(|txn| {
            let mut page = settle(txn, &ticket, result)?;
            if page.limit.is_none() {
                page.limit = signature.limit;
            }
            page.documents = page
                .documents
                .into_iter()
                .map(|task| hydrate(txn.state(), task))
                .collect();
            txn.set(ticket.key.clone(), CacheValue::TaskList(page.clone()));
            tracing::debug!(view = %signature, documents = page.documents.len(), "task list stored");
            Ok(page)
        })
    }

    /// Loads one task into the detail entry.
    pub async fn fetch_task(&self, task_id: &str) -> Result<Task> {
        let ticket = self.store.begin_fetch(CacheKey::task(task_id));
        let result = self.remote.get_task(task_id).await.inspect_err(|error| {
            tracing::warn!(task_id, error = %error, "task fetch failed");
        });

        self.store.write(|txn| {
            let task = settle(txn, &ticket, result)?;
            let task = hydrate(txn.state(), task);
            txn.set(ticket.key.clone(), CacheValue::Task(task.clone()));
            Ok(task)
        })
    }

    /// Loads the project list of a workspace for hydration.
    pub async fn fetch_projects(&self, workspace_id: &str) -> Result<ProjectList> {
        let ticket = self
            .store
            .begin_fetch(CacheKey::ProjectList(workspace_id.to_string()));
        let result = self.remote.list_projects(workspace_id).await;

        self.store.write(|txn| {
            let list = settle(txn, &ticket, result)?;
            txn.set(ticket.key.clone(), CacheValue::ProjectList(list.clone()));
            Ok(list)
        })
    }

    /// Loads the member list of a workspace for hydration.
    pub async fn fetch_members(&self, workspace_id: &str) -> Result<MemberList> {
        let ticket = self
            .store
            .begin_fetch(CacheKey::MemberList(workspace_id.to_string()));
        let result = self.remote.list_members(workspace_id).await;

        self.store.write(|txn| {
            let list = settle(txn, &ticket, result)?;
            txn.set(ticket.key.clone(), CacheValue::MemberList(list.clone()));
            Ok(list)
        })
    }

    /// Marks the task views affected by a change to a project as stale.
    ///
    /// Covers every view of the workspace without a project filter or whose
    /// filter names the project, plus the project's analytics key. Returns
    /// the number of task views invalidated.
    pub fn invalidate_project_views(&self, workspace_id: &str, project_id: &str) -> usize {
        let scope = ViewScope::workspace(workspace_id);
        self.store.write(|txn| {
            let count = txn.invalidate_matching(|key| {
                key.signature().is_some_and(|signature| {
                    scope.contains(signature)
                        && signature
                            .project_key
                            .as_ref()
                            .map_or(true, |projects| projects.contains(project_id))
                })
            });
            txn.invalidate(&CacheKey::ProjectAnalytics(project_id.to_string()));
            tracing::debug!(workspace_id, project_id, views = count, "project views invalidated");
            count
        })
    }
}

/// Ends the fetch behind `ticket` and passes its result through, unless a
/// newer fetch or a mutation superseded it.
fn settle<T>(txn: &mut StoreTxn<'_>, ticket: &FetchTicket, result: Result<T>) -> Result<T> {
    let stale = txn.state().is_fetch_superseded(ticket);
    txn.finish_fetch(ticket);
    let value = result?;
    if stale {
        tracing::warn!(key = %ticket.key, "dropping stale fetch response");
        return Err(SyncError::StaleReconciliation {
            key: ticket.key.to_string(),
        });
    }
    Ok(value)
}
