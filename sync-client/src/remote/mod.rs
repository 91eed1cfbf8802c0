//! Remote collection abstraction for mirror-sync.
//!
//! This module provides the boundary to the remote document store that owns
//! the collections. The sync layer is a client of it and never implements
//! storage itself.
//!
//! # Design
//!
//! The trait is async and collection-oriented:
//! - `subscribe()` opens a live stream of full snapshots; dropping the stream cancels it
//! - `append()` creates a record and returns its store-assigned id
//! - `delete_by_id()` removes one record
//! - `enumerate_ids()` lists the ids currently in a collection
//! - `commit_batch_delete()` removes a set of ids atomically
//!
//! # Example
//!
//! ```ignore
//! let remote = MemoryRemote::new();
//! let path = CollectionSpec::chat_history().path_for(&Subject::from("alice"));
//! let mut snapshots = remote.subscribe(&path, &OrderBy::ascending("timestamp")).await?;
//! let id = remote.append(&path, draft).await?;
//! let latest = snapshots.next().await;
//! ```

mod memory;

pub use memory::{MemoryRemote, RemoteCall};

use async_trait::async_trait;
use futures_util::Stream;
use mirror_sync_types::{
    CollectionPath, CollectionSnapshot, ErrorKind, NewRecord, OrderBy, RecordId,
};
use std::collections::BTreeSet;
use std::pin::Pin;
use thiserror::Error;

/// Errors reported by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The record does not exist.
    #[error("record {id} not found in {path}")]
    NotFound {
        /// Collection that was searched.
        path: CollectionPath,
        /// Missing record.
        id: RecordId,
    },

    /// The caller may not access the collection.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached or refused the request (network, quota).
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// A batch commit was rejected; nothing was applied.
    #[error("batch aborted: {0}")]
    BatchAborted(String),

    /// The store ended a subscription.
    #[error("subscription closed by remote")]
    SubscriptionClosed,
}

impl RemoteError {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Failure class for notifications.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Transport,
        }
    }
}

/// A live stream of full collection snapshots.
///
/// The stream yields the current snapshot first and a new one after every
/// change. An `Err` item is terminal. Dropping the stream cancels the
/// subscription.
pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<CollectionSnapshot, RemoteError>> + Send>>;

/// A remote store holding ordered, append/delete-mutable collections with
/// push-style change notification.
///
/// Implementations handle the underlying store (a hosted document database,
/// an in-process map for tests, etc).
#[async_trait]
pub trait RemoteCollectionClient: Send + Sync {
    /// Open a live subscription to a collection, sorted by `order_by`.
    async fn subscribe(
        &self,
        path: &CollectionPath,
        order_by: &OrderBy,
    ) -> Result<SnapshotStream, RemoteError>;

    /// Append a record. Returns the id the store assigned to it.
    async fn append(&self, path: &CollectionPath, record: NewRecord)
        -> Result<RecordId, RemoteError>;

    /// Delete one record.
    ///
    /// Fails with [`RemoteError::NotFound`] if the store has no such record.
    async fn delete_by_id(&self, path: &CollectionPath, id: &RecordId) -> Result<(), RemoteError>;

    /// List the ids currently in a collection.
    async fn enumerate_ids(&self, path: &CollectionPath) -> Result<BTreeSet<RecordId>, RemoteError>;

    /// Delete exactly `ids`, all or nothing.
    async fn commit_batch_delete(
        &self,
        path: &CollectionPath,
        ids: &BTreeSet<RecordId>,
    ) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        let err = RemoteError::NotFound {
            path: CollectionPath::new("users/a/messages"),
            id: RecordId::from("x"),
        };
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "record x not found in users/a/messages");
    }

    #[test]
    fn other_errors_are_transport() {
        assert_eq!(
            RemoteError::Unavailable("quota".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(RemoteError::SubscriptionClosed.kind(), ErrorKind::Transport);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteError>();
    }
}
