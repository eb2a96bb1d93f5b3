//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use taskboard_sync::{
    BulkTaskUpdate, BulkUpdateAck, CreateTaskRequest, DeletedTask, InMemoryTaskApi, MemberList,
    ProjectList, RemoteTaskApi, Task, TaskPatch, TaskQuery, TaskStatus, ViewSnapshot,
};

pub fn task(id: &str, status: TaskStatus) -> Task {
    Task {
        id: id.into(),
        name: format!("Task {id}"),
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

/// Remote wrapper that parks every call until the test releases it.
pub struct GatedApi {
    pub inner: InMemoryTaskApi,
    entered: Semaphore,
    gate: Semaphore,
}

impl GatedApi {
    pub fn new(inner: InMemoryTaskApi) -> Arc<Self> {
        Arc::new(Self {
            inner,
            entered: Semaphore::new(0),
            gate: Semaphore::new(0),
        })
    }

    /// Waits until a call is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.acquire().await.unwrap().forget();
    }

    /// Lets one parked call through.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.add_permits(1);
        self.gate.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl RemoteTaskApi for GatedApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> taskboard_sync::Result<Task> {
        self.pass().await;
        self.inner.create_task(request).await
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> taskboard_sync::Result<Task> {
        self.pass().await;
        self.inner.update_task(task_id, patch).await
    }

    async fn delete_task(&self, task_id: &str) -> taskboard_sync::Result<DeletedTask> {
        self.pass().await;
        self.inner.delete_task(task_id).await
    }

    async fn list_tasks(&self, query: &TaskQuery) -> taskboard_sync::Result<ViewSnapshot> {
        self.pass().await;
        self.inner.list_tasks(query).await
    }

    async fn get_task(&self, task_id: &str) -> taskboard_sync::Result<Task> {
        self.pass().await;
        self.inner.get_task(task_id).await
    }

    async fn bulk_update_tasks(
        &self,
        updates: &[BulkTaskUpdate],
    ) -> taskboard_sync::Result<BulkUpdateAck> {
        self.pass().await;
        self.inner.bulk_update_tasks(updates).await
    }

    async fn list_projects(&self, workspace_id: &str) -> taskboard_sync::Result<ProjectList> {
        self.pass().await;
        self.inner.list_projects(workspace_id).await
    }

    async fn list_members(&self, workspace_id: &str) -> taskboard_sync::Result<MemberList> {
        self.pass().await;
        self.inner.list_members(workspace_id).await
    }
}
