//! The remote task authority the coordinator talks to.
//!
//! [`RemoteTaskApi`] is the seam between the sync engine and the backend.
//! Two adapters ship with the crate:
//!
//! - [`InMemoryTaskApi`]: an in-process authority for tests and offline use,
//!   with failure injection.
//! - `HttpTaskApi` (feature `http-client`): a `reqwest` client for the REST
//!   backend.

pub mod memory;

#[cfg(feature = "http-client")]
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{
    BulkTaskUpdate, BulkUpdateAck, CreateTaskRequest, DeletedTask, FilterKey, MemberList,
    ProjectList, Task, TaskPatch, ViewSignature, ViewSnapshot,
};

#[cfg(feature = "http-client")]
pub use http::HttpTaskApi;
pub use memory::InMemoryTaskApi;

/// Query string of a task list request.
///
/// Multi-value filters travel as comma-joined id lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    /// Workspace partition.
    pub workspace_id: String,
    /// Comma-joined project ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Comma-joined statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Comma-joined assignee ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// Name search text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Exact due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl TaskQuery {
    /// Query-string pairs, in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("workspaceId", self.workspace_id.clone())];
        let optional = [
            ("projectId", &self.project_id),
            ("status", &self.status),
            ("assigneeId", &self.assignee_id),
            ("search", &self.search),
            ("dueDate", &self.due_date),
        ];
        pairs.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.clone().map(|value| (name, value))),
        );
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }

    /// Parses the query back into the signature it encodes.
    pub fn to_signature(&self) -> ViewSignature {
        let mut signature = ViewSignature::workspace(self.workspace_id.clone());
        signature.project_key = self.project_id.as_deref().and_then(FilterKey::parse);
        signature.status_key = self.status.as_deref().and_then(FilterKey::parse);
        signature.assignee_key = self.assignee_id.as_deref().and_then(FilterKey::parse);
        if let Some(search) = &self.search {
            signature = signature.with_search(search);
        }
        signature.due_date = self.due_date.clone();
        signature.limit = self.limit;
        signature
    }
}

impl From<&ViewSignature> for TaskQuery {
    fn from(signature: &ViewSignature) -> Self {
        Self {
            workspace_id: signature.workspace_id.clone(),
            project_id: signature.project_key.as_ref().map(ToString::to_string),
            status: signature.status_key.as_ref().map(ToString::to_string),
            assignee_id: signature.assignee_key.as_ref().map(ToString::to_string),
            search: signature.search.clone(),
            due_date: signature.due_date.clone(),
            limit: signature.limit,
        }
    }
}

/// Backend operations consumed by the sync engine.
///
/// Implementations report a non-success response as
/// [`SyncError::RemoteRejected`](crate::SyncError::RemoteRejected) and a
/// request that never completed as
/// [`SyncError::NetworkFailure`](crate::SyncError::NetworkFailure).
#[async_trait]
pub trait RemoteTaskApi: Send + Sync {
    /// Creates a task and returns the server copy.
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task>;

    /// Applies a partial update and returns the server copy.
    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task>;

    /// Deletes a task.
    async fn delete_task(&self, task_id: &str) -> Result<DeletedTask>;

    /// Lists the tasks matching `query`.
    async fn list_tasks(&self, query: &TaskQuery) -> Result<ViewSnapshot>;

    /// Fetches one task.
    async fn get_task(&self, task_id: &str) -> Result<Task>;

    /// Moves many tasks in one call. All or nothing.
    async fn bulk_update_tasks(&self, updates: &[BulkTaskUpdate]) -> Result<BulkUpdateAck>;

    /// Lists the projects of a workspace.
    async fn list_projects(&self, workspace_id: &str) -> Result<ProjectList>;

    /// Lists the members of a workspace.
    async fn list_members(&self, workspace_id: &str) -> Result<MemberList>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_from_signature_joins_keys() {
        let signature = ViewSignature::workspace("w1")
            .with_projects(["p2", "p1"])
            .with_statuses(&[TaskStatus::Done])
            .with_search("Docs")
            .with_limit(10);
        let query = TaskQuery::from(&signature);
        assert_eq!(
            query.to_pairs(),
            vec![
                ("workspaceId", "w1".to_string()),
                ("projectId", "p1,p2".to_string()),
                ("status", "DONE".to_string()),
                ("search", "Docs".to_string()),
                ("limit", "10".to_string()),
            ]
        );
        assert_eq!(query.to_signature(), signature);
    }
}
