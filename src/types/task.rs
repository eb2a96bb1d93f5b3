//! Task documents, patches, and the hydration stubs they reference.
//!
//! # Serialization
//!
//! Wire types use `camelCase` field names. Document ids serialize as `$id`
//! (and timestamps as `$createdAt` / `$updatedAt`) to match the backend's
//! document envelope. Statuses serialize in `SCREAMING_SNAKE_CASE`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Kanban lane a task sits in.
///
/// # Examples
///
/// ```
/// use taskboard_sync::TaskStatus;
///
/// assert_eq!(TaskStatus::InReview.as_str(), "IN_REVIEW");
/// assert_eq!("DONE".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
/// assert_eq!(
///     serde_json::to_value(TaskStatus::InProgress).unwrap(),
///     serde_json::json!("IN_PROGRESS")
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet scheduled.
    Backlog,
    /// Scheduled, not started.
    Todo,
    /// Being worked on.
    InProgress,
    /// Waiting for review.
    InReview,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// Every lane, in board order.
    pub const ALL: [TaskStatus; 5] = [
        Self::Backlog,
        Self::Todo,
        Self::InProgress,
        Self::InReview,
        Self::Done,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| SyncError::InvalidInput(format!("unknown task status: {value}")))
    }
}

/// Read-only project projection used to decorate tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStub {
    /// Project id.
    #[serde(rename = "$id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar image, if the project has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProjectStub {
    /// Create a stub without an image.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
        }
    }
}

/// Read-only workspace member projection used to decorate tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStub {
    /// Member id (the value stored in `Task::assignee_id`).
    #[serde(rename = "$id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact address, if visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl MemberStub {
    /// Create a stub without an email.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }
}

/// A task document as held in the view store.
///
/// `project` and `assignee` are denormalized decorations filled by the
/// cross-reference resolver. They are never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server id, or a temporary id while creation is in flight.
    #[serde(rename = "$id")]
    pub id: String,
    /// Title.
    pub name: String,
    /// Lane.
    pub status: TaskStatus,
    /// Member the task is assigned to.
    pub assignee_id: String,
    /// Owning project.
    pub project_id: String,
    /// Partition key.
    pub workspace_id: String,
    /// Ordering token within the lane.
    pub position: f64,
    /// ISO-8601 due date.
    pub due_date: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Denormalized project decoration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectStub>,
    /// Denormalized assignee decoration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<MemberStub>,
    /// Creation timestamp (RFC 3339).
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp (RFC 3339).
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Task {
    /// Returns `true` if this task carries a locally generated id.
    pub fn is_temporary(&self, prefix: &str) -> bool {
        self.id.starts_with(prefix)
    }

    /// Merges an authoritative server copy over this (possibly optimistic)
    /// copy.
    ///
    /// Every server field wins. Decorations the server omitted are kept
    /// from `self` as long as the foreign key they describe is unchanged.
    pub fn merged_with(&self, server: Task) -> Task {
        let mut merged = server;
        if merged.project.is_none() && merged.project_id == self.project_id {
            merged.project = self.project.clone();
        }
        if merged.assignee.is_none() && merged.assignee_id == self.assignee_id {
            merged.assignee = self.assignee.clone();
        }
        merged
    }
}

/// Partial update of a task. `None` means "leave untouched".
///
/// # Examples
///
/// ```
/// use taskboard_sync::{TaskPatch, TaskStatus};
///
/// let patch = TaskPatch::default().with_status(TaskStatus::Done);
/// let json = serde_json::to_value(&patch).unwrap();
/// assert_eq!(json, serde_json::json!({ "status": "DONE" }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New lane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// New project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// New due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New position token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl TaskPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the assignee.
    pub fn with_assignee(mut self, assignee_id: impl Into<String>) -> Self {
        self.assignee_id = Some(assignee_id.into());
        self
    }

    /// Sets the project.
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the due date.
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the position.
    pub fn with_position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }
}

/// Applies `patch` to `task`, overwriting only the fields present.
///
/// When the patch moves the task to a different project or assignee, the
/// matching decoration is cleared so the resolver can look up the new one.
pub fn apply_patch(task: &Task, patch: &TaskPatch) -> Task {
    let mut next = task.clone();
    if let Some(name) = &patch.name {
        next.name = name.clone();
    }
    if let Some(status) = patch.status {
        next.status = status;
    }
    if let Some(assignee_id) = &patch.assignee_id {
        if *assignee_id != next.assignee_id {
            next.assignee = None;
        }
        next.assignee_id = assignee_id.clone();
    }
    if let Some(project_id) = &patch.project_id {
        if *project_id != next.project_id {
            next.project = None;
        }
        next.project_id = project_id.clone();
    }
    if let Some(due_date) = &patch.due_date {
        next.due_date = due_date.clone();
    }
    if let Some(description) = &patch.description {
        next.description = Some(description.clone());
    }
    if let Some(position) = patch.position {
        next.position = position;
    }
    next
}

/// Body of a task creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Title.
    pub name: String,
    /// Initial lane.
    pub status: TaskStatus,
    /// Assignee.
    pub assignee_id: String,
    /// Owning project.
    pub project_id: String,
    /// Partition key.
    pub workspace_id: String,
    /// ISO-8601 due date.
    pub due_date: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateTaskRequest {
    /// Checks the required fields the backend would reject.
    pub fn validate(&self) -> Result<(), SyncError> {
        let required = [
            ("name", &self.name),
            ("workspaceId", &self.workspace_id),
            ("projectId", &self.project_id),
            ("assigneeId", &self.assignee_id),
            ("dueDate", &self.due_date),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::InvalidInput(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// Builds the provisional task shown while the create is in flight.
    pub fn to_provisional(&self, id: String, position: f64, now: &str) -> Task {
        Task {
            id,
            name: self.name.trim().to_string(),
            status: self.status,
            assignee_id: self.assignee_id.clone(),
            project_id: self.project_id.clone(),
            workspace_id: self.workspace_id.clone(),
            position,
            due_date: self.due_date.clone(),
            description: self.description.clone(),
            project: None,
            assignee: None,
            created_at: Some(now.to_string()),
            updated_at: Some(now.to_string()),
        }
    }
}

/// One entry of a kanban bulk reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTaskUpdate {
    /// Task id.
    #[serde(rename = "$id")]
    pub id: String,
    /// Destination lane.
    pub status: TaskStatus,
    /// Destination position token.
    pub position: f64,
}

impl BulkTaskUpdate {
    /// Create an entry.
    pub fn new(id: impl Into<String>, status: TaskStatus, position: f64) -> Self {
        Self {
            id: id.into(),
            status,
            position,
        }
    }
}

/// Server acknowledgement of a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedTask {
    /// Id of the deleted task.
    #[serde(rename = "$id")]
    pub id: String,
    /// Workspace it belonged to.
    pub workspace_id: String,
    /// Project it belonged to.
    pub project_id: String,
}

/// Server acknowledgement of a bulk update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateAck {
    /// Workspace the updated tasks belong to.
    pub workspace_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Task {
        Task {
            id: "t1".into(),
            name: "Write docs".into(),
            status: TaskStatus::Todo,
            assignee_id: "m1".into(),
            project_id: "p1".into(),
            workspace_id: "w1".into(),
            position: 1000.0,
            due_date: "2025-01-31".into(),
            description: None,
            project: Some(ProjectStub::new("p1", "Docs")),
            assignee: Some(MemberStub::new("m1", "Ada")),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn task_wire_format() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["$id"], "t1");
        assert_eq!(value["assigneeId"], "m1");
        assert_eq!(value["status"], "TODO");
        assert_eq!(value["project"]["$id"], "p1");
        assert!(value.get("description").is_none());

        let parsed: Task = serde_json::from_value(json!({
            "$id": "t2",
            "name": "n",
            "status": "IN_REVIEW",
            "assigneeId": "m",
            "projectId": "p",
            "workspaceId": "w",
            "position": 2500,
            "dueDate": "2025-02-01",
        }))
        .unwrap();
        assert_eq!(parsed.status, TaskStatus::InReview);
        assert_eq!(parsed.position, 2500.0);
        assert!(parsed.project.is_none());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let task = sample();
        let patched = apply_patch(&task, &TaskPatch::default().with_name("Renamed"));
        assert_eq!(patched.name, "Renamed");
        assert_eq!(patched.status, task.status);
        assert_eq!(patched.project, task.project);
        assert_eq!(apply_patch(&task, &TaskPatch::default()), task);
    }

    #[test]
    fn patch_clears_decoration_when_foreign_key_changes() {
        let task = sample();
        let patched = apply_patch(&task, &TaskPatch::default().with_project("p2"));
        assert_eq!(patched.project_id, "p2");
        assert!(patched.project.is_none());
        assert!(patched.assignee.is_some());

        let same = apply_patch(&task, &TaskPatch::default().with_assignee("m1"));
        assert!(same.assignee.is_some());
    }

    #[test]
    fn merge_keeps_decoration_for_unchanged_keys() {
        let local = sample();
        let mut server = sample();
        server.project = None;
        server.assignee = None;
        server.assignee_id = "m2".into();
        server.name = "From server".into();

        let merged = local.merged_with(server);
        assert_eq!(merged.name, "From server");
        assert_eq!(merged.project, local.project);
        assert!(merged.assignee.is_none());
    }

    #[test]
    fn create_request_validation() {
        let mut request = CreateTaskRequest {
            name: "  ".into(),
            status: TaskStatus::Backlog,
            assignee_id: "m1".into(),
            project_id: "p1".into(),
            workspace_id: "w1".into(),
            due_date: "2025-01-01".into(),
            description: None,
        };
        assert_eq!(
            request.validate(),
            Err(SyncError::InvalidInput("name is required".into()))
        );
        request.name = "Ship".into();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn status_parsing_rejects_unknown() {
        assert!("DOING".parse::<TaskStatus>().is_err());
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }
}
