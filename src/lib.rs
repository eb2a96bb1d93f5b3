//! Optimistic multi-view task cache synchronization.
//!
//! This crate keeps several independently filtered projections of a shared
//! task collection consistent with each other and with a remote authority.
//! Local edits are applied to every affected view immediately, then either
//! reconciled with the server's answer or rolled back precisely when the
//! remote call fails.
//!
//! # Overview
//!
//! A *view* is a task list addressed by its [`ViewSignature`] (workspace,
//! project/status/assignee filters, search text, due date, page limit). The
//! [`ViewStore`] holds views alongside single-task detail entries and the
//! project and member lists used to decorate tasks.
//!
//! The [`MutationCoordinator`] drives create, update, delete, and bulk
//! reorder through the same lifecycle: snapshot, optimistic apply, remote
//! call, then reconcile or roll back. Every edit keeps each view's
//! membership invariant: a view only ever holds tasks that match its
//! signature.
//!
//! # Module Organization
//!
//! - [`types`] - Tasks, patches, view signatures and snapshots, cache keys
//! - [`store`] - The view store, version stamps, and change events
//! - [`filter`] - View membership predicate
//! - [`hydrate`] - Project and assignee decoration from sibling lists
//! - [`position`] - Kanban position tokens
//! - [`coordinator`] - Mutation lifecycle and fetch paths
//! - [`remote`] - Backend seam, in-memory and HTTP adapters
//! - [`config`] - Engine configuration
//! - [`error`] - Error taxonomy

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod hydrate;
#[cfg(feature = "logging")]
pub mod logging;
pub mod position;
pub mod remote;
pub mod store;
pub mod types;

// Re-exports for ergonomic access
pub use config::{RemoteEndpoint, SyncConfig};
pub use coordinator::{
    MutationContext, MutationCoordinator, MutationKind, MutationOutcome, RollbackReport,
};
pub use error::{Result, SyncError};
#[cfg(feature = "logging")]
pub use logging::init_logging;
#[cfg(feature = "http-client")]
pub use remote::HttpTaskApi;
pub use remote::{InMemoryTaskApi, RemoteTaskApi, TaskQuery};
pub use store::{FetchTicket, KeyMeta, StoreEvent, StoreEventKind, StoreState, StoreTxn, ViewStore};
pub use types::*;
