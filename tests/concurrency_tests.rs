//! Concurrency tests: stale fetches, superseded reconciliation, and
//! rollback under concurrent writers.
//!
//! Two coordinators share one store. One talks to a gated remote whose
//! calls are parked until released, the other to a direct in-memory
//! remote, so interleavings are deterministic.

mod common;

use std::sync::Arc;

use common::{task, GatedApi};
use taskboard_sync::{
    CacheKey, CreateTaskRequest, InMemoryTaskApi, MutationCoordinator, SyncError, Task, TaskPatch,
    TaskStatus, ViewSignature, ViewSnapshot, ViewStore,
};

/// Server holding `tasks`, shared by a gated and a direct coordinator.
fn pair(
    store: &Arc<ViewStore>,
    tasks: &[Task],
) -> (Arc<MutationCoordinator>, Arc<GatedApi>, MutationCoordinator, Arc<InMemoryTaskApi>) {
    let seeded = || {
        tasks
            .iter()
            .cloned()
            .fold(InMemoryTaskApi::new(), InMemoryTaskApi::with_task)
    };
    let gated = GatedApi::new(seeded());
    let direct = Arc::new(seeded());
    (
        Arc::new(MutationCoordinator::new(store.clone(), gated.clone())),
        gated,
        MutationCoordinator::new(store.clone(), direct.clone()),
        direct,
    )
}

// ─── Stale Fetches ──────────────────────────────────────────────────────────

mod stale_fetch_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_older_fetch_is_dropped_when_newer_fetch_lands_first() {
        let store = Arc::new(ViewStore::new());
        let signature = ViewSignature::workspace("w1");
        let (slow, gate, fast, _) = pair(&store, &[task("t1", TaskStatus::Todo)]);

        let handle = {
            let slow = slow.clone();
            let signature = signature.clone();
            tokio::spawn(async move { slow.fetch_tasks(&signature).await })
        };
        gate.wait_entered().await;

        let fresh = fast.fetch_tasks(&signature).await.unwrap();

        gate.release();
        let stale = handle.await.unwrap();
        assert!(matches!(stale, Err(SyncError::StaleReconciliation { .. })));
        assert_eq!(store.get_task_list(&signature), Some(fresh));
    }

    #[tokio::test]
    async fn test_fetch_is_dropped_when_mutation_claims_the_view() {
        let store = Arc::new(ViewStore::new());
        let signature = ViewSignature::workspace("w1");
        let t1 = task("t1", TaskStatus::Todo);
        store.set_task_list(signature.clone(), ViewSnapshot::new(vec![t1.clone()]));
        let (slow, gate, fast, _) = pair(&store, &[t1]);

        let handle = {
            let slow = slow.clone();
            let signature = signature.clone();
            tokio::spawn(async move { slow.fetch_tasks(&signature).await })
        };
        gate.wait_entered().await;

        fast.update_task("t1", TaskPatch::default().with_name("Edited"))
            .await
            .unwrap();

        gate.release();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SyncError::StaleReconciliation { .. })));
        let current = store.get_task_list(&signature).unwrap();
        assert_eq!(current.documents[0].name, "Edited");
    }
}

// ─── Superseded Reconciliation ──────────────────────────────────────────────

mod supersede_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_older_success_does_not_clobber_newer_edit() {
        let store = Arc::new(ViewStore::new());
        let signature = ViewSignature::workspace("w1");
        let t1 = task("t1", TaskStatus::Todo);
        store.set_task_list(signature.clone(), ViewSnapshot::new(vec![t1.clone()]));
        let (slow, gate, fast, _) = pair(&store, &[t1]);

        let handle = {
            let slow = slow.clone();
            tokio::spawn(async move {
                slow.update_task("t1", TaskPatch::default().with_name("First"))
                    .await
            })
        };
        gate.wait_entered().await;

        fast.update_task("t1", TaskPatch::default().with_name("Second"))
            .await
            .unwrap();

        gate.release();
        let older = handle.await.unwrap().unwrap();
        assert_eq!(older.name, "First");

        let key = CacheKey::tasks(signature.clone());
        assert_eq!(store.get_task_list(&signature).unwrap().documents[0].name, "Second");
        assert!(store.is_invalidated(&key));
    }

    #[tokio::test]
    async fn test_mutations_on_different_tasks_both_reconcile() {
        let store = Arc::new(ViewStore::new());
        let all = ViewSignature::workspace("w1");
        let done = ViewSignature::workspace("w1").with_statuses(&[TaskStatus::Done]);
        let other = ViewSignature::workspace("w2");
        let t1 = task("t1", TaskStatus::Todo);
        let t2 = task("t2", TaskStatus::Done);
        let x = Task {
            workspace_id: "w2".into(),
            ..task("x", TaskStatus::Todo)
        };
        store.set_task_list(all.clone(), ViewSnapshot::new(vec![t1.clone(), t2.clone()]));
        store.set_task_list(done.clone(), ViewSnapshot::new(vec![t2.clone()]));
        store.set_task_list(other.clone(), ViewSnapshot::new(vec![x.clone()]));
        let (slow, gate, fast, _) = pair(&store, &[t1, t2, x]);

        let handle = {
            let slow = slow.clone();
            tokio::spawn(async move {
                slow.update_task("t1", TaskPatch::default().with_status(TaskStatus::Done))
                    .await
            })
        };
        gate.wait_entered().await;

        fast.update_task("x", TaskPatch::default().with_name("Elsewhere"))
            .await
            .unwrap();
        fast.update_task("t2", TaskPatch::default().with_name("Edited"))
            .await
            .unwrap();

        gate.release();
        handle.await.unwrap().unwrap();

        let view = store.get_task_list(&done).unwrap();
        let ids: Vec<&str> = view.documents.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(view.total, 2);
        assert_eq!(view.documents[1].name, "Edited");
        assert!(!store.is_invalidated(&CacheKey::tasks(done)));
        assert!(!store.is_invalidated(&CacheKey::tasks(all.clone())));
        assert_eq!(store.get_task_list(&all).unwrap().documents[0].status, TaskStatus::Done);
        assert_eq!(store.get_task_list(&other).unwrap().documents[0].name, "Elsewhere");
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_increasing_positions() {
        let store = Arc::new(ViewStore::new());
        let signature = ViewSignature::workspace("w1");
        store.set_task_list(signature.clone(), ViewSnapshot::default());
        let (slow, gate, _fast, _) = pair(&store, &[]);

        let mut handles = Vec::new();
        for name in ["a", "b", "c"] {
            let slow = slow.clone();
            handles.push(tokio::spawn(async move {
                slow.create_task(CreateTaskRequest {
                    name: name.into(),
                    status: TaskStatus::Todo,
                    assignee_id: "m1".into(),
                    project_id: "p1".into(),
                    workspace_id: "w1".into(),
                    due_date: "2025-01-31".into(),
                    description: None,
                })
                .await
            }));
            gate.wait_entered().await;
        }

        let positions: Vec<f64> = store
            .get_task_list(&signature)
            .unwrap()
            .documents
            .iter()
            .rev()
            .map(|t| t.position)
            .collect();
        assert_eq!(positions, vec![1000.0, 2000.0, 3000.0]);

        gate.release();
        gate.release();
        gate.release();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let settled = store.get_task_list(&signature).unwrap();
        assert_eq!(settled.documents.len(), 3);
        assert_eq!(settled.total, 3);
        assert!(settled.documents.iter().all(|t| !t.id.starts_with("temp-")));
    }
}

// ─── Contended Rollback ─────────────────────────────────────────────────────

mod contended_rollback_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_failed_create_keeps_unrelated_concurrent_edit() {
        let store = Arc::new(ViewStore::new());
        let signature = ViewSignature::workspace("w1");
        let t1 = task("t1", TaskStatus::Todo);
        store.set_task_list(signature.clone(), ViewSnapshot::new(vec![t1.clone()]));
        let (slow, gate, fast, _) = pair(&store, &[t1]);
        gate.inner.fail_next(SyncError::rejected(500, "create failed"));

        let handle = {
            let slow = slow.clone();
            tokio::spawn(async move {
                slow.create_task(CreateTaskRequest {
                    name: "Doomed".into(),
                    status: TaskStatus::Todo,
                    assignee_id: "m1".into(),
                    project_id: "p1".into(),
                    workspace_id: "w1".into(),
                    due_date: "2025-01-31".into(),
                    description: None,
                })
                .await
            })
        };
        gate.wait_entered().await;
        assert_eq!(store.get_task_list(&signature).unwrap().total, 2);

        fast.update_task("t1", TaskPatch::default().with_name("Kept"))
            .await
            .unwrap();

        gate.release();
        assert!(handle.await.unwrap().is_err());

        let view = store.get_task_list(&signature).unwrap();
        assert_eq!(view.documents.len(), 1);
        assert_eq!(view.documents[0].id, "t1");
        assert_eq!(view.documents[0].name, "Kept");
        assert_eq!(view.total, 1);
        assert!(store.is_invalidated(&CacheKey::tasks(signature)));
    }

    #[tokio::test]
    async fn test_failed_delete_reinserts_next_to_concurrent_edit() {
        let store = Arc::new(ViewStore::new());
        let signature = ViewSignature::workspace("w1");
        let t1 = task("t1", TaskStatus::Todo);
        let t2 = task("t2", TaskStatus::Todo);
        store.set_task_list(
            signature.clone(),
            ViewSnapshot::new(vec![t1.clone(), t2.clone()]),
        );
        let (slow, gate, fast, _) = pair(&store, &[t1, t2]);
        gate.inner.fail_next(SyncError::network("timeout"));

        let handle = {
            let slow = slow.clone();
            tokio::spawn(async move { slow.delete_task("t1").await })
        };
        gate.wait_entered().await;

        fast.update_task("t2", TaskPatch::default().with_name("Edited"))
            .await
            .unwrap();

        gate.release();
        assert!(handle.await.unwrap().is_err());

        let view = store.get_task_list(&signature).unwrap();
        let names: Vec<&str> = view.documents.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Task t1", "Edited"]);
        assert_eq!(view.total, 2);
    }
}
