//! Cross-reference resolver.
//!
//! Fills a task's `project` and `assignee` decorations from the project and
//! member lists already resident in the store. Lookups are best-effort: a
//! decoration that cannot be found stays absent.

use crate::store::{StoreState, ViewStore};
use crate::types::{MemberStub, ProjectStub, Task};

/// Returns `task` with any missing decoration resolved from `state`.
///
/// Present decorations are left alone, so hydrating twice is the same as
/// hydrating once.
pub fn hydrate(state: &StoreState, task: Task) -> Task {
    let mut task = task;
    if task.project.is_none() {
        task.project = find_project(state, &task.workspace_id, &task.project_id).cloned();
    }
    if task.assignee.is_none() {
        task.assignee = find_member(state, &task.workspace_id, &task.assignee_id).cloned();
    }
    task
}

/// First project named `project_id` across the workspace's resident
/// project lists, in store insertion order.
pub fn find_project<'a>(
    state: &'a StoreState,
    workspace_id: &'a str,
    project_id: &str,
) -> Option<&'a ProjectStub> {
    if project_id.is_empty() {
        return None;
    }
    state
        .project_lists(workspace_id)
        .flat_map(|list| list.documents.iter())
        .find(|project| project.id == project_id)
}

/// First member named `member_id` across the workspace's resident member
/// lists, in store insertion order.
pub fn find_member<'a>(
    state: &'a StoreState,
    workspace_id: &'a str,
    member_id: &str,
) -> Option<&'a MemberStub> {
    if member_id.is_empty() {
        return None;
    }
    state
        .member_lists(workspace_id)
        .flat_map(|list| list.documents.iter())
        .find(|member| member.id == member_id)
}

impl ViewStore {
    /// Hydrates `task` against the current contents of the store.
    pub fn hydrate(&self, task: Task) -> Task {
        self.read(|state| hydrate(state, task))
    }
}
