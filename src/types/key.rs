//! Cache addressing: keys, values, and prefix scopes.

use std::fmt;

use serde_json::Value;

use crate::types::task::Task;
use crate::types::view::{MemberList, ProjectList, ViewSignature, ViewSnapshot};

/// Address of one entry in the [`ViewStore`](crate::store::ViewStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A filtered task list.
    TaskList(ViewSignature),
    /// The single-task detail entry.
    Task(String),
    /// Project list of a workspace.
    ProjectList(String),
    /// Member list of a workspace.
    MemberList(String),
    /// Workspace analytics aggregate.
    WorkspaceAnalytics(String),
    /// Project analytics aggregate.
    ProjectAnalytics(String),
}

impl CacheKey {
    /// Task list key for `signature`.
    pub fn tasks(signature: ViewSignature) -> Self {
        Self::TaskList(signature)
    }

    /// Detail key for `task_id`.
    pub fn task(task_id: impl Into<String>) -> Self {
        Self::Task(task_id.into())
    }

    /// The view signature, for task list keys.
    pub fn signature(&self) -> Option<&ViewSignature> {
        match self {
            Self::TaskList(signature) => Some(signature),
            _ => None,
        }
    }

    /// Returns `true` for task list keys inside `scope`.
    pub fn is_task_list_in(&self, scope: &ViewScope) -> bool {
        self.signature()
            .is_some_and(|signature| scope.contains(signature))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskList(signature) => write!(f, "tasks/{signature}"),
            Self::Task(id) => write!(f, "task/{id}"),
            Self::ProjectList(workspace) => write!(f, "projects/{workspace}"),
            Self::MemberList(workspace) => write!(f, "members/{workspace}"),
            Self::WorkspaceAnalytics(workspace) => write!(f, "workspace-analytics/{workspace}"),
            Self::ProjectAnalytics(project) => write!(f, "project-analytics/{project}"),
        }
    }
}

/// Value stored under a [`CacheKey`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// Payload of [`CacheKey::TaskList`].
    TaskList(ViewSnapshot),
    /// Payload of [`CacheKey::Task`].
    Task(Task),
    /// Payload of [`CacheKey::ProjectList`].
    ProjectList(ProjectList),
    /// Payload of [`CacheKey::MemberList`].
    MemberList(MemberList),
    /// Opaque analytics payload, owned by the host.
    Analytics(Value),
}

impl CacheValue {
    /// The snapshot, for task list values.
    pub fn as_task_list(&self) -> Option<&ViewSnapshot> {
        match self {
            Self::TaskList(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// The task, for detail values.
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    /// The list, for project list values.
    pub fn as_project_list(&self) -> Option<&ProjectList> {
        match self {
            Self::ProjectList(list) => Some(list),
            _ => None,
        }
    }

    /// The list, for member list values.
    pub fn as_member_list(&self) -> Option<&MemberList> {
        match self {
            Self::MemberList(list) => Some(list),
            _ => None,
        }
    }
}

/// Signature prefix selecting task lists regardless of their finer filter
/// components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewScope {
    /// Every task list.
    AllTasks,
    /// Every task list of one workspace.
    Workspace(String),
}

impl ViewScope {
    /// Scope for one workspace.
    pub fn workspace(workspace_id: impl Into<String>) -> Self {
        Self::Workspace(workspace_id.into())
    }

    /// Returns `true` if `signature` falls under this prefix.
    pub fn contains(&self, signature: &ViewSignature) -> bool {
        match self {
            Self::AllTasks => true,
            Self::Workspace(workspace_id) => signature.workspace_id == *workspace_id,
        }
    }
}
