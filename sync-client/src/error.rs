//! Error taxonomy of the sync layer.

use mirror_sync_types::ErrorKind;
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors returned by sessions and the mutation gateway.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Operation attempted with no bound subject.
    #[error("no subject bound to collection")]
    NoSubject,

    /// A remote call failed.
    #[error("transport error: {0}")]
    Transport(#[from] RemoteError),

    /// A batch delete did not commit. Nothing is considered deleted.
    #[error("batch delete of {attempted} records failed: {source}")]
    PartialBatchFailure {
        /// Number of records the batch covered.
        attempted: usize,
        /// Remote failure.
        #[source]
        source: RemoteError,
    },

    /// The session was disposed.
    #[error("session closed")]
    SessionClosed,
}

impl SyncError {
    /// Failure class for notifications.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSubject => ErrorKind::NoSubject,
            Self::Transport(e) => e.kind(),
            Self::PartialBatchFailure { .. } => ErrorKind::PartialBatchFailure,
            Self::SessionClosed => ErrorKind::SessionClosed,
        }
    }

    /// Check if the remote reported a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_not_found())
    }
}
