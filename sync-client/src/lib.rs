//! # sync-client
//!
//! Live collection mirroring for mirror-sync.
//!
//! This is the library applications use to keep a local, ordered copy of a
//! per-subject remote collection and to write to it.
//!
//! ## Features
//!
//! - **Sessions**: one live subscription per selected subject, with stale
//!   deliveries from earlier subjects discarded
//! - **Mutation Gateway**: add, delete and atomic batch clear, scoped to the
//!   bound subject
//! - **Remote Abstraction**: pluggable store client (in-memory included)
//! - **Pure State Machine**: uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use mirror_sync_client::{MemoryRemote, MutationGateway, SyncSession, TracingRelay};
//! use mirror_sync_types::{ChatMessage, CollectionSpec, OrderingKey, Subject};
//!
//! let remote = Arc::new(MemoryRemote::new());
//! let relay = Arc::new(TracingRelay);
//! let session = SyncSession::new(remote.clone(), CollectionSpec::chat_history(), relay.clone());
//! let gateway = MutationGateway::new(remote, relay);
//!
//! session.set_subject(Some(Subject::from("alice"))).await?;
//! let draft = ChatMessage::user("hi").into_new_record(OrderingKey::now())?;
//! gateway.add(&session.collection_ref(), draft).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod gateway;
pub mod relay;
pub mod remote;
pub mod session;

pub use error::SyncError;
pub use gateway::MutationGateway;
pub use mirror_sync_core::SessionState;
pub use relay::{ChannelRelay, NotificationRelay, NullRelay, TracingRelay};
pub use remote::{MemoryRemote, RemoteCall, RemoteCollectionClient, RemoteError, SnapshotStream};
pub use session::{SessionView, SyncSession};
