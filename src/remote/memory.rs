//! In-process task authority.
//!
//! [`InMemoryTaskApi`] behaves like the REST backend closely enough to drive
//! the coordinator end to end: it assigns ids and positions, filters and
//! pages lists, hydrates list results from its own project and member
//! tables, and applies bulk updates all-or-nothing.
//!
//! # Failure Injection
//!
//! Errors queued with [`fail_next`](InMemoryTaskApi::fail_next) are returned
//! by the next calls, one per call, before any state is touched.
//!
//! # Examples
//!
//! ```
//! use taskboard_sync::{InMemoryTaskApi, ProjectStub, SyncError};
//!
//! let api = InMemoryTaskApi::new()
//!     .with_projects("w1", vec![ProjectStub::new("p1", "Docs")]);
//! api.fail_next(SyncError::rejected(500, "boom"));
//! assert_eq!(api.call_count(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::constants::DEFAULT_POSITION_STEP;
use crate::error::{Result, SyncError};
use crate::filter;
use crate::types::{
    apply_patch, BulkTaskUpdate, BulkUpdateAck, CreateTaskRequest, DeletedTask, MemberList,
    MemberStub, ProjectList, ProjectStub, Task, TaskPatch, TaskStatus, ViewSnapshot,
};

use super::{RemoteTaskApi, TaskQuery};

/// In-memory [`RemoteTaskApi`].
#[derive(Debug, Default)]
pub struct InMemoryTaskApi {
    tasks: RwLock<IndexMap<String, Task>>,
    projects: DashMap<String, Vec<ProjectStub>>,
    members: DashMap<String, Vec<MemberStub>>,
    failures: Mutex<VecDeque<SyncError>>,
    calls: AtomicUsize,
}

impl InMemoryTaskApi {
    /// Creates an empty authority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a task. Decorations are dropped; the authority stores raw
    /// documents.
    pub fn with_task(self, task: Task) -> Self {
        self.tasks.write().insert(task.id.clone(), strip(task));
        self
    }

    /// Seeds the project table of a workspace.
    pub fn with_projects(self, workspace_id: impl Into<String>, projects: Vec<ProjectStub>) -> Self {
        self.projects.insert(workspace_id.into(), projects);
        self
    }

    /// Seeds the member table of a workspace.
    pub fn with_members(self, workspace_id: impl Into<String>, members: Vec<MemberStub>) -> Self {
        self.members.insert(workspace_id.into(), members);
        self
    }

    /// Queues an error for the next call.
    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().push_back(error);
    }

    /// Number of calls received so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Server copy of a task.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().get(task_id).cloned()
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns `true` if no task is stored.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    fn enter(&self, operation: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(error) => {
                debug!(operation, error = %error, "injected remote failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn not_found(task_id: &str) -> SyncError {
        SyncError::rejected(404, format!("task not found: {task_id}"))
    }

    fn decorate(&self, mut task: Task) -> Task {
        task.project = self.projects.get(&task.workspace_id).and_then(|projects| {
            projects
                .iter()
                .find(|project| project.id == task.project_id)
                .cloned()
        });
        task.assignee = self.members.get(&task.workspace_id).and_then(|members| {
            members
                .iter()
                .find(|member| member.id == task.assignee_id)
                .cloned()
        });
        task
    }

    fn next_position(tasks: &IndexMap<String, Task>, workspace_id: &str, status: TaskStatus) -> f64 {
        tasks
            .values()
            .filter(|task| task.workspace_id == workspace_id && task.status == status)
            .map(|task| task.position)
            .fold(None, |max: Option<f64>, position| {
                Some(max.map_or(position, |max| max.max(position)))
            })
            .map_or(DEFAULT_POSITION_STEP, |max| max + DEFAULT_POSITION_STEP)
    }
}

fn strip(mut task: Task) -> Task {
    task.project = None;
    task.assignee = None;
    task
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl RemoteTaskApi for InMemoryTaskApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task> {
        self.enter("create_task")?;
        request
            .validate()
            .map_err(|error| SyncError::rejected(400, error.to_string()))?;

        let mut tasks = self.tasks.write();
        let position = Self::next_position(&tasks, &request.workspace_id, request.status);
        let task = request.to_provisional(Uuid::new_v4().to_string(), position, &now());
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task> {
        self.enter("update_task")?;
        let mut tasks = self.tasks.write();
        let current = tasks.get(task_id).ok_or_else(|| Self::not_found(task_id))?;
        let mut updated = apply_patch(current, patch);
        updated.updated_at = Some(now());
        tasks.insert(task_id.to_string(), updated.clone());
        Ok(updated)
    }

    async fn delete_task(&self, task_id: &str) -> Result<DeletedTask> {
        self.enter("delete_task")?;
        let removed = self
            .tasks
            .write()
            .shift_remove(task_id)
            .ok_or_else(|| Self::not_found(task_id))?;
        Ok(DeletedTask {
            id: removed.id,
            workspace_id: removed.workspace_id,
            project_id: removed.project_id,
        })
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<ViewSnapshot> {
        self.enter("list_tasks")?;
        let signature = query.to_signature();
        let matching: Vec<Task> = self
            .tasks
            .read()
            .values()
            .rev()
            .filter(|task| filter::matches(task, &signature))
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let documents = matching
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|task| self.decorate(task))
            .collect();
        let mut snapshot = ViewSnapshot::new(documents).with_total(total);
        snapshot.limit = query.limit;
        Ok(snapshot)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.enter("get_task")?;
        let task = self.task(task_id).ok_or_else(|| Self::not_found(task_id))?;
        Ok(self.decorate(task))
    }

    async fn bulk_update_tasks(&self, updates: &[BulkTaskUpdate]) -> Result<BulkUpdateAck> {
        self.enter("bulk_update_tasks")?;
        let mut tasks = self.tasks.write();
        if let Some(missing) = updates.iter().find(|update| !tasks.contains_key(&update.id)) {
            return Err(Self::not_found(&missing.id));
        }
        let first = updates
            .first()
            .ok_or_else(|| SyncError::rejected(400, "no tasks to update"))?;
        let workspace_id = tasks
            .get(&first.id)
            .map(|task| task.workspace_id.clone())
            .unwrap_or_default();

        let stamp = now();
        for update in updates {
            if let Some(task) = tasks.get_mut(&update.id) {
                task.status = update.status;
                task.position = update.position;
                task.updated_at = Some(stamp.clone());
            }
        }
        Ok(BulkUpdateAck { workspace_id })
    }

    async fn list_projects(&self, workspace_id: &str) -> Result<ProjectList> {
        self.enter("list_projects")?;
        let projects = self
            .projects
            .get(workspace_id)
            .map(|projects| projects.clone())
            .unwrap_or_default();
        Ok(ProjectList::new(projects))
    }

    async fn list_members(&self, workspace_id: &str) -> Result<MemberList> {
        self.enter("list_members")?;
        let members = self
            .members
            .get(workspace_id)
            .map(|members| members.clone())
            .unwrap_or_default();
        Ok(MemberList::new(members))
    }
}
