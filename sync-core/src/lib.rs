//! # sync-core
//!
//! Pure logic for mirror-sync (no I/O, instant tests).
//!
//! This crate implements the session state machine, the generation counter
//! used to cancel subscriptions, and the local mirror container, without any
//! network or task handling.
//!
//! ## Design Philosophy
//!
//! The state machine is **pure** - it takes an event and produces a new state
//! plus a list of actions, without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (subscriptions, remote calls) is performed by `sync-client`,
//! which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod generation;
pub mod mirror;
pub mod state;

pub use generation::GenerationCounter;
pub use mirror::LocalMirror;
pub use state::{Action, Event, SessionEvent, SessionState};
