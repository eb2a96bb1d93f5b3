//! Engine-wide defaults.

/// Gap left between consecutive position tokens in a status lane.
///
/// The wide gap leaves room for drag-and-drop insertions between two
/// neighbours without renumbering the lane.
pub const DEFAULT_POSITION_STEP: f64 = 1000.0;

/// Prefix of locally generated ids for tasks awaiting server confirmation.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Default capacity of the store and outcome broadcast channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default remote request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Prefix of the environment variables read by
/// [`SyncConfig::from_env`](crate::config::SyncConfig::from_env).
pub const ENV_PREFIX: &str = "TASKBOARD_SYNC_";
