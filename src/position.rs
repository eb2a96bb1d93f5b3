//! Position tokens for kanban lanes.
//!
//! Tokens are sparse `f64` values: new tasks go to the end of a lane at
//! `max + step`, drag-and-drop inserts take the midpoint of their
//! neighbours. The server's token always wins on reconciliation.

use crate::store::{StoreState, ViewStore};
use crate::types::{BulkTaskUpdate, Task, TaskStatus, ViewScope};

/// Next free token at the end of `status` in `workspace_id`.
///
/// Scans every resident task list of the workspace. Returns `step` when the
/// lane is empty everywhere.
pub fn next_position(state: &StoreState, workspace_id: &str, status: TaskStatus, step: f64) -> f64 {
    let scope = ViewScope::workspace(workspace_id);
    let max = state
        .task_lists(&scope)
        .flat_map(|(_, snapshot)| snapshot.documents.iter())
        .filter(|task| task.status == status && task.workspace_id == workspace_id)
        .map(|task| task.position)
        .fold(None, |max: Option<f64>, position| {
            Some(max.map_or(position, |max| max.max(position)))
        });
    match max {
        Some(max) if max > 0.0 => max + step,
        _ => step,
    }
}

/// A token strictly between `before` and `after`.
///
/// # Examples
///
/// ```
/// use taskboard_sync::position::position_between;
///
/// assert_eq!(position_between(Some(1000.0), Some(2000.0), 1000.0), 1500.0);
/// assert_eq!(position_between(None, Some(1000.0), 1000.0), 0.0);
/// assert_eq!(position_between(Some(3000.0), None, 1000.0), 4000.0);
/// assert_eq!(position_between(None, None, 1000.0), 1000.0);
/// ```
pub fn position_between(before: Option<f64>, after: Option<f64>, step: f64) -> f64 {
    match (before, after) {
        (Some(before), Some(after)) => before + (after - before) / 2.0,
        (None, Some(after)) => after - step,
        (Some(before), None) => before + step,
        (None, None) => step,
    }
}

/// Plans dropping `task_id` at `to_index` of the destination lane.
///
/// `lane` holds the destination lane's tasks in display order. The moved
/// task is ignored if it is already in the lane, and `to_index` is clamped
/// to the lane's length.
pub fn plan_move(
    lane: &[Task],
    task_id: &str,
    to_status: TaskStatus,
    to_index: usize,
    step: f64,
) -> BulkTaskUpdate {
    let others: Vec<f64> = lane
        .iter()
        .filter(|task| task.id != task_id)
        .map(|task| task.position)
        .collect();
    let index = to_index.min(others.len());
    let before = index.checked_sub(1).map(|i| others[i]);
    let after = others.get(index).copied();
    BulkTaskUpdate::new(task_id, to_status, position_between(before, after, step))
}

impl ViewStore {
    /// Next free token at the end of `status` in `workspace_id`.
    pub fn next_position(&self, workspace_id: &str, status: TaskStatus, step: f64) -> f64 {
        self.read(|state| next_position(state, workspace_id, status, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ViewSignature, ViewSnapshot};
    use pretty_assertions::assert_eq;

    fn task(id: &str, status: TaskStatus, position: f64) -> Task {
        Task {
            id: id.into(),
            name: id.into(),
            status,
            assignee_id: "m1".into(),
            project_id: "p1".into(),
            workspace_id: "w1".into(),
            position,
            due_date: "2025-01-01".into(),
            description: None,
            project: None,
            assignee: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn empty_lane_starts_at_step() {
        let store = ViewStore::new();
        assert_eq!(store.next_position("w1", TaskStatus::Todo, 1000.0), 1000.0);
    }

    #[test]
    fn scans_every_view_of_the_workspace() {
        let store = ViewStore::new();
        store.set_task_list(
            ViewSignature::workspace("w1"),
            ViewSnapshot::new(vec![task("a", TaskStatus::Todo, 2000.0)]),
        );
        store.set_task_list(
            ViewSignature::workspace("w1").with_projects(["p1"]),
            ViewSnapshot::new(vec![
                task("b", TaskStatus::Todo, 5000.0),
                task("c", TaskStatus::Done, 9000.0),
            ]),
        );
        assert_eq!(store.next_position("w1", TaskStatus::Todo, 1000.0), 6000.0);
        assert_eq!(store.next_position("w1", TaskStatus::Done, 10.0), 9010.0);
        assert_eq!(store.next_position("w2", TaskStatus::Todo, 1000.0), 1000.0);
    }

    #[test]
    fn plan_move_between_neighbours() {
        let lane = vec![
            task("a", TaskStatus::Done, 1000.0),
            task("b", TaskStatus::Done, 2000.0),
        ];
        let update = plan_move(&lane, "x", TaskStatus::Done, 1, 1000.0);
        assert_eq!(update, BulkTaskUpdate::new("x", TaskStatus::Done, 1500.0));

        let head = plan_move(&lane, "x", TaskStatus::Done, 0, 1000.0);
        assert_eq!(head.position, 0.0);

        let tail = plan_move(&lane, "x", TaskStatus::Done, 99, 1000.0);
        assert_eq!(tail.position, 3000.0);
    }

    #[test]
    fn plan_move_within_same_lane_ignores_self() {
        let lane = vec![
            task("a", TaskStatus::Todo, 1000.0),
            task("b", TaskStatus::Todo, 2000.0),
            task("c", TaskStatus::Todo, 3000.0),
        ];
        let update = plan_move(&lane, "a", TaskStatus::Todo, 2, 1000.0);
        assert_eq!(update.position, 4000.0);
    }
}
