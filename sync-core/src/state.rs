//! Session state machine for mirror-sync.
//!
//! This module provides a pure, side-effect-free state machine for one
//! subscription session. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (opening subscriptions, swapping the mirror, notifying) is
//! performed by sync-client, not by this module.
//!
//! Every delivery carries the generation of the subscription it came from.
//! A delivery whose generation is not the active one yields only
//! [`Action::DiscardStale`], so a late snapshot from a previous subject can
//! never reach the mirror.

use std::sync::Arc;

use mirror_sync_types::{CollectionSnapshot, ErrorKind, Generation};
use serde::Serialize;

/// Session state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionState {
    /// No subject; mirror empty.
    Idle,
    /// Subscription opening, no snapshot received yet.
    Loading {
        /// Generation of the pending subscription.
        generation: Generation,
    },
    /// At least one snapshot received; the mirror reflects the latest.
    Synced {
        /// Generation of the live subscription.
        generation: Generation,
        /// Number of records in the applied snapshot.
        records: usize,
    },
    /// The subscription failed. The mirror keeps the last good snapshot,
    /// if any, as stale data.
    Failed {
        /// Generation of the failed subscription.
        generation: Generation,
        /// Error message describing the failure.
        error: String,
    },
}

impl SessionState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Subject selection always tears down and rebuilds
            (Self::Idle, Event::SubjectSelected { generation }) => (
                Self::Loading { generation },
                vec![
                    Action::ClearMirror,
                    Action::OpenSubscription { generation },
                    Action::PublishView,
                ],
            ),
            (_, Event::SubjectSelected { generation }) => (
                Self::Loading { generation },
                vec![
                    Action::CancelSubscription,
                    Action::ClearMirror,
                    Action::OpenSubscription { generation },
                    Action::PublishView,
                ],
            ),

            // Subject removed or session disposed
            (Self::Idle, Event::SubjectCleared | Event::DisposeRequested) => (Self::Idle, vec![]),
            (_, Event::SubjectCleared | Event::DisposeRequested) => (
                Self::Idle,
                vec![
                    Action::CancelSubscription,
                    Action::ClearMirror,
                    Action::PublishView,
                ],
            ),

            // Snapshot for the active subscription
            (
                Self::Loading { generation } | Self::Synced { generation, .. },
                Event::SnapshotReceived {
                    generation: delivered,
                    snapshot,
                },
            ) if delivered == generation => {
                let records = snapshot.len();
                (
                    Self::Synced {
                        generation,
                        records,
                    },
                    vec![
                        Action::ReplaceMirror { snapshot },
                        Action::PublishView,
                        Action::EmitEvent(SessionEvent::Synced {
                            generation,
                            records,
                        }),
                    ],
                )
            }

            // Failure of the active subscription is terminal for its generation
            (
                Self::Loading { generation } | Self::Synced { generation, .. },
                Event::SubscriptionFailed {
                    generation: delivered,
                    kind,
                    error,
                },
            ) if delivered == generation => (
                Self::Failed {
                    generation,
                    error: error.clone(),
                },
                vec![
                    Action::CancelSubscription,
                    Action::PublishView,
                    Action::EmitEvent(SessionEvent::SubscriptionFailed {
                        generation,
                        kind,
                        error,
                    }),
                ],
            ),

            // Anything else delivered is stale (old generation, idle, or after failure)
            (state, Event::SnapshotReceived { generation, .. })
            | (state, Event::SubscriptionFailed { generation, .. }) => {
                (state, vec![Action::DiscardStale { generation }])
            }
        }
    }

    /// The generation of the current subscription, if any.
    pub fn active_generation(&self) -> Option<Generation> {
        match self {
            Self::Idle => None,
            Self::Loading { generation }
            | Self::Synced { generation, .. }
            | Self::Failed { generation, .. } => Some(*generation),
        }
    }

    /// Check if no subject is bound.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if waiting for the first snapshot.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Check if the mirror reflects a live subscription.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }

    /// Check if the subscription failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A (different) subject was selected; `generation` tags its subscription.
    SubjectSelected {
        /// Freshly issued generation for the new subscription.
        generation: Generation,
    },
    /// The subject was removed.
    SubjectCleared,
    /// A subscription delivered a full snapshot.
    SnapshotReceived {
        /// Generation of the delivering subscription.
        generation: Generation,
        /// The delivered snapshot.
        snapshot: Arc<CollectionSnapshot>,
    },
    /// A subscription reported an error.
    SubscriptionFailed {
        /// Generation of the failing subscription.
        generation: Generation,
        /// Failure class.
        kind: ErrorKind,
        /// Error message describing the failure.
        error: String,
    },
    /// The session owner is done with the session.
    DisposeRequested,
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Stop the current subscription so it can deliver nothing further.
    CancelSubscription,
    /// Reset the mirror to empty.
    ClearMirror,
    /// Open a subscription for the current subject.
    OpenSubscription {
        /// Generation to tag its deliveries with.
        generation: Generation,
    },
    /// Swap the mirror to the given snapshot.
    ReplaceMirror {
        /// Snapshot to install.
        snapshot: Arc<CollectionSnapshot>,
    },
    /// Republish the session view to observers.
    PublishView,
    /// Drop a delivery from a superseded subscription.
    DiscardStale {
        /// Generation the delivery was tagged with.
        generation: Generation,
    },
    /// Emit an event to the application.
    EmitEvent(SessionEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A snapshot was applied.
    Synced {
        /// Generation of the subscription.
        generation: Generation,
        /// Number of records now mirrored.
        records: usize,
    },
    /// The subscription failed.
    SubscriptionFailed {
        /// Generation of the failed subscription.
        generation: Generation,
        /// Failure class.
        kind: ErrorKind,
        /// Error message describing the failure.
        error: String,
    },
}
