//! Data model: tasks, view signatures and snapshots, cache keys.

pub mod key;
pub mod task;
pub mod view;

pub use key::{CacheKey, CacheValue, ViewScope};
pub use task::{
    apply_patch, BulkTaskUpdate, BulkUpdateAck, CreateTaskRequest, DeletedTask, MemberStub,
    ProjectStub, Task, TaskPatch, TaskStatus,
};
pub use view::{DocumentList, FilterKey, MemberList, ProjectList, ViewSignature, ViewSnapshot};
