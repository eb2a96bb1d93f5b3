//! Error types for the synchronization engine.
//!
//! [`SyncError`] separates failures that roll a mutation back
//! ([`RemoteRejected`](SyncError::RemoteRejected),
//! [`NetworkFailure`](SyncError::NetworkFailure)) from responses that are
//! simply discarded because a newer context already holds authority
//! ([`StaleReconciliation`](SyncError::StaleReconciliation)).

use thiserror::Error;

/// Errors surfaced by the view store, the remote adapters, and the
/// mutation coordinator.
///
/// # Examples
///
/// ```
/// use taskboard_sync::SyncError;
///
/// let err = SyncError::rejected(422, "name is required");
/// assert!(err.triggers_rollback());
/// assert_eq!(err.status_code(), Some(422));
///
/// let err = SyncError::StaleReconciliation { key: "tasks/w1".to_string() };
/// assert!(!err.triggers_rollback());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The backend answered with a non-success status (validation,
    /// authorization, not-found).
    #[error("remote rejected request with status {status}: {message}")]
    RemoteRejected {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The request never completed (connection refused, timeout, TLS).
    #[error("network failure: {message}")]
    NetworkFailure {
        /// Transport-level description of the failure.
        message: String,
    },

    /// A response arrived for a context that has since been superseded by
    /// a newer one touching the same cache key.
    #[error("stale response for {key} discarded")]
    StaleReconciliation {
        /// Display form of the superseded cache key.
        key: String,
    },

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Caller input failed validation before any optimistic step ran.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    /// Shorthand for [`SyncError::RemoteRejected`].
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for [`SyncError::NetworkFailure`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
        }
    }

    /// Returns `true` when a mutation that hit this error must restore its
    /// pre-mutation snapshot.
    pub fn triggers_rollback(&self) -> bool {
        matches!(
            self,
            Self::RemoteRejected { .. } | Self::NetworkFailure { .. }
        )
    }

    /// The HTTP status code carried by a [`SyncError::RemoteRejected`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(format!("TOML parse error: {}", err))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            SyncError::rejected(404, "task not found").to_string(),
            "remote rejected request with status 404: task not found"
        );
        assert_eq!(
            SyncError::network("connection reset").to_string(),
            "network failure: connection reset"
        );
        assert_eq!(
            SyncError::StaleReconciliation {
                key: "task/t1".to_string()
            }
            .to_string(),
            "stale response for task/t1 discarded"
        );
    }

    #[test]
    fn rollback_classification() {
        assert!(SyncError::rejected(500, "boom").triggers_rollback());
        assert!(SyncError::network("timeout").triggers_rollback());
        assert!(!SyncError::InvalidInput("empty".into()).triggers_rollback());
        assert!(!SyncError::Configuration("bad".into()).triggers_rollback());
        assert_eq!(SyncError::network("x").status_code(), None);
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let err: SyncError = serde_json::from_str::<u32>("not-json").unwrap_err().into();
        assert!(matches!(err, SyncError::Serialization(_)));
    }
}
