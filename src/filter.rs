//! Filter predicate: does a task belong in a view?
//!
//! Every clause of a [`ViewSignature`] is evaluated against the task and the
//! results are ANDed. An absent clause is vacuously true.

use crate::types::{FilterKey, Task, ViewSignature};

/// Returns `true` if `task` belongs in the view addressed by `signature`.
///
/// # Examples
///
/// ```
/// use taskboard_sync::{filter, Task, TaskStatus, ViewSignature};
///
/// let task: Task = serde_json::from_value(serde_json::json!({
///     "$id": "t1", "name": "Write Docs", "status": "TODO",
///     "assigneeId": "m1", "projectId": "p1", "workspaceId": "w1",
///     "position": 1000, "dueDate": "2025-01-01"
/// })).unwrap();
///
/// assert!(filter::matches(&task, &ViewSignature::workspace("w1").with_search("docs")));
/// assert!(!filter::matches(&task, &ViewSignature::workspace("w1").with_statuses(&[TaskStatus::Done])));
/// assert!(!filter::matches(&task, &ViewSignature::workspace("w2")));
/// ```
pub fn matches(task: &Task, signature: &ViewSignature) -> bool {
    task.workspace_id == signature.workspace_id
        && key_admits(signature.project_key.as_ref(), &task.project_id)
        && key_admits(signature.status_key.as_ref(), task.status.as_str())
        && key_admits(signature.assignee_key.as_ref(), &task.assignee_id)
        && signature
            .due_date
            .as_ref()
            .map_or(true, |due| *due == task.due_date)
        && search_admits(signature.search.as_deref(), &task.name)
}

fn key_admits(key: Option<&FilterKey>, value: &str) -> bool {
    match key {
        None => true,
        Some(key) => !value.is_empty() && key.contains(value),
    }
}

fn search_admits(search: Option<&str>, name: &str) -> bool {
    let needle = match search.map(str::trim) {
        None | Some("") => return true,
        Some(needle) => needle.to_lowercase(),
    };
    name.to_lowercase().contains(&needle)
}
