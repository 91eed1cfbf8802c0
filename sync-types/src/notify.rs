//! Structured notification events.
//!
//! The sync layer reports outcomes as data. Turning them into display text
//! (and picking a language) belongs to whoever consumes them.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::ids::{CollectionPath, RecordId};

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// An operation succeeded.
    Info,
    /// An operation failed.
    Error,
}

/// The operation an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Record insertion.
    Add,
    /// Single record deletion.
    Delete,
    /// Whole-collection clear.
    Clear,
    /// Live subscription.
    Sync,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationDetail {
    /// A record was created.
    Added {
        /// Target collection.
        path: CollectionPath,
        /// Store-assigned id.
        id: RecordId,
    },
    /// A record was deleted.
    Deleted {
        /// Target collection.
        path: CollectionPath,
        /// Deleted record.
        id: RecordId,
    },
    /// A collection was cleared.
    Cleared {
        /// Target collection.
        path: CollectionPath,
        /// Number of records in the committed batch.
        deleted: usize,
    },
    /// An operation failed.
    Failed {
        /// Target collection, when one was resolved.
        path: Option<CollectionPath>,
        /// Failure class.
        kind: ErrorKind,
        /// Diagnostic message (not for display).
        message: String,
    },
}

/// A single relay event: `{ severity, operation, detail }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Event severity.
    pub severity: Severity,
    /// Operation reported on.
    pub operation: Operation,
    /// Event payload.
    pub detail: NotificationDetail,
}

impl Notification {
    /// A success event.
    pub fn info(operation: Operation, detail: NotificationDetail) -> Self {
        Self {
            severity: Severity::Info,
            operation,
            detail,
        }
    }

    /// A failure event.
    pub fn failure(
        operation: Operation,
        path: Option<CollectionPath>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            operation,
            detail: NotificationDetail::Failed {
                path,
                kind,
                message: message.into(),
            },
        }
    }

    /// Whether this reports a failure.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
