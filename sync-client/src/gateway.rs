//! Mutation gateway: subject-scoped writes to a remote collection.
//!
//! Every operation resolves the collection path from a [`CollectionRef`]
//! first and refuses to touch the remote when no subject is bound. Each
//! outcome, success or failure, is reported to the relay exactly once.
//!
//! Writes never touch a session's mirror directly; their effect shows up
//! when the subscription delivers the next snapshot.

use mirror_sync_types::{
    CollectionPath, CollectionRef, NewRecord, Notification, NotificationDetail, Operation,
    RecordId,
};
use std::sync::Arc;

use crate::error::SyncError;
use crate::relay::NotificationRelay;
use crate::remote::RemoteCollectionClient;

/// Issues add, delete and clear operations against a remote store.
pub struct MutationGateway<R: RemoteCollectionClient> {
    remote: Arc<R>,
    relay: Arc<dyn NotificationRelay>,
}

impl<R: RemoteCollectionClient> MutationGateway<R> {
    /// Create a gateway over a remote.
    pub fn new(remote: Arc<R>, relay: Arc<dyn NotificationRelay>) -> Self {
        Self { remote, relay }
    }

    /// Append a record and return its store-assigned id.
    pub async fn add(
        &self,
        collection: &CollectionRef,
        record: NewRecord,
    ) -> Result<RecordId, SyncError> {
        let path = self.resolve(collection, Operation::Add)?;

        match self.remote.append(&path, record).await {
            Ok(id) => {
                tracing::debug!("Added {} to {}", id, path);
                self.relay.notify(Notification::info(
                    Operation::Add,
                    NotificationDetail::Added { path, id: id.clone() },
                ));
                Ok(id)
            }
            Err(e) => Err(self.fail(Operation::Add, Some(path), e.into())),
        }
    }

    /// Delete one record by id.
    ///
    /// The id is sent as-is; a record the remote does not have comes back
    /// as a not-found error.
    pub async fn delete_one(
        &self,
        collection: &CollectionRef,
        id: &RecordId,
    ) -> Result<(), SyncError> {
        let path = self.resolve(collection, Operation::Delete)?;

        match self.remote.delete_by_id(&path, id).await {
            Ok(()) => {
                tracing::debug!("Deleted {} from {}", id, path);
                self.relay.notify(Notification::info(
                    Operation::Delete,
                    NotificationDetail::Deleted { path, id: id.clone() },
                ));
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::Delete, Some(path), e.into())),
        }
    }

    /// Delete every record currently in the collection.
    ///
    /// Enumerates the ids first, then commits one atomic batch of exactly
    /// that set. Records added after enumeration survive. Returns the
    /// number of records in the batch.
    pub async fn batch_clear(&self, collection: &CollectionRef) -> Result<usize, SyncError> {
        let path = self.resolve(collection, Operation::Clear)?;

        let ids = match self.remote.enumerate_ids(&path).await {
            Ok(ids) => ids,
            Err(e) => return Err(self.fail(Operation::Clear, Some(path), e.into())),
        };

        let attempted = ids.len();
        if attempted > 0 {
            if let Err(source) = self.remote.commit_batch_delete(&path, &ids).await {
                let err = SyncError::PartialBatchFailure { attempted, source };
                return Err(self.fail(Operation::Clear, Some(path), err));
            }
        }

        tracing::info!("Cleared {} records from {}", attempted, path);
        self.relay.notify(Notification::info(
            Operation::Clear,
            NotificationDetail::Cleared {
                path,
                deleted: attempted,
            },
        ));
        Ok(attempted)
    }

    fn resolve(
        &self,
        collection: &CollectionRef,
        operation: Operation,
    ) -> Result<CollectionPath, SyncError> {
        collection
            .path()
            .ok_or_else(|| self.fail(operation, None, SyncError::NoSubject))
    }

    fn fail(
        &self,
        operation: Operation,
        path: Option<CollectionPath>,
        err: SyncError,
    ) -> SyncError {
        tracing::warn!("{:?} on {:?} failed: {}", operation, path, err);
        self.relay.notify(Notification::failure(
            operation,
            path,
            err.kind(),
            err.to_string(),
        ));
        err
    }
}
