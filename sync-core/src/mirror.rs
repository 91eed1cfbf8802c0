//! Local mirror of a subscribed collection.
//!
//! Replace-only: a new snapshot swaps in as a whole, there is no
//! incremental patching. The lock is held only for the `Arc` swap, so a
//! reader never waits on a writer for longer than a pointer assignment and
//! always gets an immutable, complete snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mirror_sync_types::CollectionSnapshot;

/// In-process replica of the latest known snapshot.
#[derive(Debug)]
pub struct LocalMirror {
    current: Mutex<Arc<CollectionSnapshot>>,
}

impl LocalMirror {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Arc::new(CollectionSnapshot::empty())),
        }
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, snapshot: Arc<CollectionSnapshot>) {
        *self.lock() = snapshot;
    }

    /// The current snapshot.
    pub fn read(&self) -> Arc<CollectionSnapshot> {
        Arc::clone(&self.lock())
    }

    /// Reset to an empty snapshot.
    pub fn clear(&self) {
        self.replace(Arc::new(CollectionSnapshot::empty()));
    }

    /// Number of records in the current snapshot.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The guarded value is a single Arc, so a panic elsewhere can never
    // leave it half-written; recover from poisoning.
    fn lock(&self) -> MutexGuard<'_, Arc<CollectionSnapshot>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LocalMirror {
    fn default() -> Self {
        Self::new()
    }
}
