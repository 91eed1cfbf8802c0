//! In-process remote for tests, demos and the CLI.
//!
//! Holds collections in memory and pushes a fresh full snapshot to every
//! live subscriber after each mutation. Failures can be injected per call.

use super::{RemoteCollectionClient, RemoteError, SnapshotStream};
use async_trait::async_trait;
use mirror_sync_types::{
    CollectionPath, CollectionSnapshot, NewRecord, OrderBy, Record, RecordId, SortDirection,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// A call made against the remote, recorded for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `subscribe(path, ..)`
    Subscribe(CollectionPath),
    /// `append(path, ..)`
    Append(CollectionPath),
    /// `delete_by_id(path, id)`
    DeleteById(CollectionPath, RecordId),
    /// `enumerate_ids(path)`
    EnumerateIds(CollectionPath),
    /// `commit_batch_delete(path, ids)`
    CommitBatchDelete(CollectionPath, BTreeSet<RecordId>),
}

/// In-memory remote collection store.
///
/// Cloning shares the underlying store.
#[derive(Debug, Default, Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryRemoteInner>>,
}

#[derive(Debug, Default)]
struct MemoryRemoteInner {
    /// Records per collection, in insertion order.
    collections: HashMap<CollectionPath, Vec<Record>>,
    subscribers: HashMap<CollectionPath, Vec<Subscriber>>,
    calls: Vec<RemoteCall>,
    fail_next_subscribe: Option<RemoteError>,
    fail_next_append: Option<RemoteError>,
    fail_next_delete: Option<RemoteError>,
    fail_next_enumerate: Option<RemoteError>,
    fail_next_commit: Option<RemoteError>,
}

#[derive(Debug)]
struct Subscriber {
    direction: SortDirection,
    sender: mpsc::UnboundedSender<Result<CollectionSnapshot, RemoteError>>,
}

impl MemoryRemoteInner {
    fn snapshot(&self, path: &CollectionPath, direction: SortDirection) -> CollectionSnapshot {
        let records = self.collections.get(path).cloned().unwrap_or_default();
        CollectionSnapshot::ordered(records, direction)
    }

    /// Push the current snapshot to every live subscriber of `path`,
    /// forgetting subscribers whose stream was dropped.
    fn publish(&mut self, path: &CollectionPath) {
        let records = self.collections.get(path).cloned().unwrap_or_default();
        if let Some(subscribers) = self.subscribers.get_mut(path) {
            subscribers.retain(|sub| {
                let snapshot = CollectionSnapshot::ordered(records.clone(), sub.direction);
                sub.sender.send(Ok(snapshot)).is_ok()
            });
        }
    }
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records directly, bypassing the call log and failure injection.
    ///
    /// Subscribers are notified as for a normal append.
    pub fn seed(&self, path: &CollectionPath, records: Vec<NewRecord>) -> Vec<RecordId> {
        let mut inner = self.lock();
        let ids: Vec<RecordId> = {
            let collection = inner.collections.entry(path.clone()).or_default();
            records
                .into_iter()
                .map(|draft| {
                    let id = RecordId::generate();
                    collection.push(draft.with_id(id.clone()));
                    id
                })
                .collect()
        };
        inner.publish(path);
        ids
    }

    /// Current records of a collection, in insertion order.
    pub fn records(&self, path: &CollectionPath) -> Vec<Record> {
        self.lock()
            .collections
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of subscriptions on `path` whose stream is still alive.
    pub fn subscriber_count(&self, path: &CollectionPath) -> usize {
        let mut inner = self.lock();
        match inner.subscribers.get_mut(path) {
            Some(subscribers) => {
                subscribers.retain(|sub| !sub.sender.is_closed());
                subscribers.len()
            }
            None => 0,
        }
    }

    /// End every subscription on `path` with the given error.
    pub fn fail_subscriptions(&self, path: &CollectionPath, error: RemoteError) {
        let mut inner = self.lock();
        if let Some(subscribers) = inner.subscribers.remove(path) {
            for sub in subscribers {
                let _ = sub.sender.send(Err(error.clone()));
            }
        }
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: RemoteError) {
        self.lock().fail_next_subscribe = Some(error);
    }

    /// Cause the next append() to fail with the given error.
    pub fn fail_next_append(&self, error: RemoteError) {
        self.lock().fail_next_append = Some(error);
    }

    /// Cause the next delete_by_id() to fail with the given error.
    pub fn fail_next_delete(&self, error: RemoteError) {
        self.lock().fail_next_delete = Some(error);
    }

    /// Cause the next enumerate_ids() to fail with the given error.
    pub fn fail_next_enumerate(&self, error: RemoteError) {
        self.lock().fail_next_enumerate = Some(error);
    }

    /// Cause the next commit_batch_delete() to fail with the given error.
    /// Nothing is deleted by the failed commit.
    pub fn fail_next_commit(&self, error: RemoteError) {
        self.lock().fail_next_commit = Some(error);
    }

    /// Clear all state (collections, subscribers, calls, injected failures).
    pub fn reset(&self) {
        *self.lock() = MemoryRemoteInner::default();
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteCollectionClient for MemoryRemote {
    async fn subscribe(
        &self,
        path: &CollectionPath,
        order_by: &OrderBy,
    ) -> Result<SnapshotStream, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Subscribe(path.clone()));

        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(error);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        // Initial delivery is the current state of the collection
        let _ = sender.send(Ok(inner.snapshot(path, order_by.direction)));
        inner
            .subscribers
            .entry(path.clone())
            .or_default()
            .push(Subscriber {
                direction: order_by.direction,
                sender,
            });

        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        });
        Ok(Box::pin(stream))
    }

    async fn append(
        &self,
        path: &CollectionPath,
        record: NewRecord,
    ) -> Result<RecordId, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::Append(path.clone()));

        if let Some(error) = inner.fail_next_append.take() {
            return Err(error);
        }

        let id = RecordId::generate();
        inner
            .collections
            .entry(path.clone())
            .or_default()
            .push(record.with_id(id.clone()));
        inner.publish(path);
        Ok(id)
    }

    async fn delete_by_id(&self, path: &CollectionPath, id: &RecordId) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RemoteCall::DeleteById(path.clone(), id.clone()));

        if let Some(error) = inner.fail_next_delete.take() {
            return Err(error);
        }

        let collection = inner.collections.entry(path.clone()).or_default();
        let before = collection.len();
        collection.retain(|r| &r.id != id);
        if collection.len() == before {
            return Err(RemoteError::NotFound {
                path: path.clone(),
                id: id.clone(),
            });
        }
        inner.publish(path);
        Ok(())
    }

    async fn enumerate_ids(&self, path: &CollectionPath) -> Result<BTreeSet<RecordId>, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(RemoteCall::EnumerateIds(path.clone()));

        if let Some(error) = inner.fail_next_enumerate.take() {
            return Err(error);
        }

        Ok(inner
            .collections
            .get(path)
            .map(|records| records.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default())
    }

    async fn commit_batch_delete(
        &self,
        path: &CollectionPath,
        ids: &BTreeSet<RecordId>,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RemoteCall::CommitBatchDelete(path.clone(), ids.clone()));

        if let Some(error) = inner.fail_next_commit.take() {
            return Err(error);
        }

        // Ids already gone are skipped, like a document-store batch delete.
        if let Some(collection) = inner.collections.get_mut(path) {
            collection.retain(|r| !ids.contains(&r.id));
        }
        inner.publish(path);
        Ok(())
    }
}
