//! SyncSession - one live subscription per active subject.
//!
//! A [`SyncSession`] keeps a [`LocalMirror`] of one collection for whichever
//! subject is currently selected, and republishes the mirror to observers as
//! snapshots arrive.
//!
//! # Architecture
//!
//! The session owns a single task that is the only writer of the mirror.
//! Callers talk to it through a command channel; subscription streams are
//! read by a forwarder task per generation, which tags every delivery with
//! its generation and passes it into the same task. The pure state machine
//! from sync-core decides what each command or delivery does.
//!
//! ```text
//! set_subject ──▶ command ──┐
//!                           ▼
//! forwarder(gen) ─▶ delivery ─▶ session task ─▶ SessionState::on_event ─▶ actions
//!                                   │                                      │
//!                                   └──── LocalMirror / watch / relay ◀───┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let remote = Arc::new(MemoryRemote::new());
//! let (relay, events) = ChannelRelay::new();
//! let session = SyncSession::new(remote, CollectionSpec::chat_history(), Arc::new(relay));
//!
//! session.set_subject(Some(Subject::from("alice"))).await?;
//! let mut views = session.observe();
//! views.wait_for(|v| v.state.is_synced()).await?;
//! let messages = session.current_snapshot();
//! ```

use futures_util::StreamExt;
use mirror_sync_core::{Action, Event, GenerationCounter, LocalMirror, SessionEvent, SessionState};
use mirror_sync_types::{
    CollectionPath, CollectionRef, CollectionSnapshot, CollectionSpec, Generation, Notification,
    Operation, OrderBy, Subject,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::relay::NotificationRelay;
use crate::remote::{RemoteCollectionClient, RemoteError};

/// What observers see: subject, state and the mirrored snapshot, published
/// together so they always agree with each other.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// The selected subject.
    pub subject: Option<Subject>,
    /// Session state.
    pub state: SessionState,
    /// Mirror content.
    pub snapshot: Arc<CollectionSnapshot>,
}

impl SessionView {
    fn idle() -> Self {
        Self {
            subject: None,
            state: SessionState::Idle,
            snapshot: Arc::new(CollectionSnapshot::empty()),
        }
    }
}

enum Command {
    SetSubject {
        subject: Option<Subject>,
        done: oneshot::Sender<()>,
    },
    Dispose {
        done: oneshot::Sender<()>,
    },
}

struct Delivery {
    generation: Generation,
    result: Result<CollectionSnapshot, RemoteError>,
}

/// Mirrors one collection for the currently selected subject.
///
/// Dropping the session stops its task and cancels the subscription.
pub struct SyncSession {
    spec: CollectionSpec,
    mirror: Arc<LocalMirror>,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
}

impl SyncSession {
    /// Create an idle session for `spec`.
    ///
    /// Must be called from within a Tokio runtime: the session task is
    /// spawned immediately.
    pub fn new<R>(
        remote: Arc<R>,
        spec: CollectionSpec,
        relay: Arc<dyn NotificationRelay>,
    ) -> Self
    where
        R: RemoteCollectionClient + 'static,
    {
        let mirror = Arc::new(LocalMirror::new());
        let (view_tx, view_rx) = watch::channel(SessionView::idle());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (actor, deliveries_rx) =
            SessionActor::new(remote, spec.clone(), relay, Arc::clone(&mirror), view_tx);
        tokio::spawn(actor.run(commands_rx, deliveries_rx));

        Self {
            spec,
            mirror,
            commands: commands_tx,
            view: view_rx,
        }
    }

    /// Select the subject whose collection is mirrored (or none).
    ///
    /// If it differs from the current subject, the previous subscription is
    /// cancelled and the mirror reset before this returns; state is then
    /// `Loading` (subject present) or `Idle` (absent). Selecting the current
    /// subject again does nothing.
    pub async fn set_subject(&self, subject: Option<Subject>) -> Result<(), SyncError> {
        let (done, ack) = oneshot::channel();
        self.commands
            .send(Command::SetSubject { subject, done })
            .map_err(|_| SyncError::SessionClosed)?;
        ack.await.map_err(|_| SyncError::SessionClosed)
    }

    /// The mirror's current content.
    pub fn current_snapshot(&self) -> Arc<CollectionSnapshot> {
        self.mirror.read()
    }

    /// The session state.
    pub fn state(&self) -> SessionState {
        self.view.borrow().state.clone()
    }

    /// The selected subject.
    pub fn subject(&self) -> Option<Subject> {
        self.view.borrow().subject.clone()
    }

    /// Generation of the current subscription, if a subject is selected.
    pub fn generation(&self) -> Option<Generation> {
        self.view.borrow().state.active_generation()
    }

    /// The latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Watch the session. A new view is published on every state change
    /// and every applied snapshot.
    pub fn observe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// The mirrored collection.
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// The collection bound to the current subject, for use with
    /// [`MutationGateway`](crate::MutationGateway).
    pub fn collection_ref(&self) -> CollectionRef {
        self.spec.bind(self.subject())
    }

    /// Cancel the subscription and stop the session.
    ///
    /// Safe to call any number of times, with or without an active
    /// subscription.
    pub async fn dispose(&self) {
        let (done, ack) = oneshot::channel();
        if self.commands.send(Command::Dispose { done }).is_ok() {
            let _ = ack.await;
        }
    }

    /// Check if the session has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// The single owner of a session's mirror and subscription.
struct SessionActor<R> {
    remote: Arc<R>,
    spec: CollectionSpec,
    relay: Arc<dyn NotificationRelay>,
    mirror: Arc<LocalMirror>,
    view: watch::Sender<SessionView>,
    state: SessionState,
    subject: Option<Subject>,
    generations: GenerationCounter,
    subscription: Option<JoinHandle<()>>,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl<R: RemoteCollectionClient + 'static> SessionActor<R> {
    fn new(
        remote: Arc<R>,
        spec: CollectionSpec,
        relay: Arc<dyn NotificationRelay>,
        mirror: Arc<LocalMirror>,
        view: watch::Sender<SessionView>,
    ) -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (deliveries, deliveries_rx) = mpsc::unbounded_channel();
        let actor = Self {
            remote,
            spec,
            relay,
            mirror,
            view,
            state: SessionState::new(),
            subject: None,
            generations: GenerationCounter::new(),
            subscription: None,
            deliveries,
        };
        (actor, deliveries_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::SetSubject { subject, done }) => {
                        self.set_subject(subject);
                        let _ = done.send(());
                    }
                    Some(Command::Dispose { done }) => {
                        commands.close();
                        self.dispose();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.dispose();
                        break;
                    }
                },
                Some(delivery) = deliveries.recv() => match delivery.result {
                    Ok(snapshot) => self.on_snapshot(delivery.generation, snapshot),
                    Err(error) => self.on_error(delivery.generation, error),
                },
            }
        }
        tracing::debug!("Session for {} stopped", self.spec.name);
    }

    fn set_subject(&mut self, subject: Option<Subject>) {
        if subject == self.subject {
            return;
        }

        let generation = self.generations.advance();
        let event = match &subject {
            Some(s) => {
                tracing::info!(
                    "Subject for {} changed to {} (generation {})",
                    self.spec.name,
                    s,
                    generation
                );
                Event::SubjectSelected { generation }
            }
            None => {
                tracing::info!("Subject for {} cleared", self.spec.name);
                Event::SubjectCleared
            }
        };
        self.subject = subject;
        self.apply(event);
    }

    fn on_snapshot(&mut self, generation: Generation, snapshot: CollectionSnapshot) {
        self.apply(Event::SnapshotReceived {
            generation,
            snapshot: Arc::new(snapshot),
        });
    }

    fn on_error(&mut self, generation: Generation, error: RemoteError) {
        self.apply(Event::SubscriptionFailed {
            generation,
            kind: error.kind(),
            error: error.to_string(),
        });
    }

    fn dispose(&mut self) {
        // Anything still queued from the current subscription becomes stale.
        self.generations.advance();
        self.subject = None;
        self.apply(Event::DisposeRequested);
        if let Some(handle) = self.subscription.take() {
            handle.abort();
        }
    }

    fn apply(&mut self, event: Event) {
        let (state, actions) = std::mem::take(&mut self.state).on_event(event);
        self.state = state;
        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::CancelSubscription => {
                if let Some(handle) = self.subscription.take() {
                    handle.abort();
                }
            }
            Action::ClearMirror => self.mirror.clear(),
            Action::OpenSubscription { generation } => self.open_subscription(generation),
            Action::ReplaceMirror { snapshot } => self.mirror.replace(snapshot),
            Action::PublishView => {
                self.view.send_replace(SessionView {
                    subject: self.subject.clone(),
                    state: self.state.clone(),
                    snapshot: self.mirror.read(),
                });
            }
            Action::DiscardStale { generation } => {
                tracing::debug!(
                    "Discarding delivery from generation {} (current {})",
                    generation,
                    self.generations.current()
                );
            }
            Action::EmitEvent(SessionEvent::Synced {
                generation,
                records,
            }) => {
                tracing::debug!(
                    "Applied snapshot of {} records (generation {})",
                    records,
                    generation
                );
            }
            Action::EmitEvent(SessionEvent::SubscriptionFailed {
                generation,
                kind,
                error,
            }) => {
                let path = self.current_path();
                tracing::warn!(
                    "Subscription to {:?} failed (generation {}): {}",
                    path,
                    generation,
                    error
                );
                self.relay
                    .notify(Notification::failure(Operation::Sync, path, kind, error));
            }
        }
    }

    fn open_subscription(&mut self, generation: Generation) {
        let Some(path) = self.current_path() else {
            return;
        };
        tracing::debug!("Opening subscription to {} (generation {})", path, generation);

        let task = forward_snapshots(
            Arc::clone(&self.remote),
            path,
            self.spec.order_by.clone(),
            generation,
            self.deliveries.clone(),
        );
        self.subscription = Some(tokio::spawn(task));
    }

    fn current_path(&self) -> Option<CollectionPath> {
        self.subject.as_ref().map(|s| self.spec.path_for(s))
    }
}

/// Open a subscription and pass every item into the session task, tagged
/// with `generation`. Stops after the first error.
async fn forward_snapshots<R: RemoteCollectionClient>(
    remote: Arc<R>,
    path: CollectionPath,
    order_by: OrderBy,
    generation: Generation,
    deliveries: mpsc::UnboundedSender<Delivery>,
) {
    let mut stream = match remote.subscribe(&path, &order_by).await {
        Ok(stream) => stream,
        Err(error) => {
            let _ = deliveries.send(Delivery {
                generation,
                result: Err(error),
            });
            return;
        }
    };

    while let Some(result) = stream.next().await {
        let terminal = result.is_err();
        if deliveries.send(Delivery { generation, result }).is_err() || terminal {
            return;
        }
    }

    let _ = deliveries.send(Delivery {
        generation,
        result: Err(RemoteError::SubscriptionClosed),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::ChannelRelay;
    use crate::remote::MemoryRemote;
    use mirror_sync_types::{ErrorKind, Fields, NewRecord, OrderingKey, RecordId, Severity};
    use std::time::Duration;

    fn alice() -> Subject {
        Subject::from("alice")
    }

    fn bob() -> Subject {
        Subject::from("bob")
    }

    fn draft(millis: i64) -> NewRecord {
        NewRecord::new(OrderingKey::from_millis(millis), Fields::new())
    }

    fn snapshot_of(ids: &[&str]) -> CollectionSnapshot {
        CollectionSnapshot::from_records(
            ids.iter()
                .enumerate()
                .map(|(i, id)| draft(i as i64).with_id(RecordId::from(*id)))
                .collect(),
        )
    }

    fn test_actor(
        remote: MemoryRemote,
    ) -> (
        SessionActor<MemoryRemote>,
        mpsc::UnboundedReceiver<Notification>,
    ) {
        let (relay, events) = ChannelRelay::new();
        let (view_tx, _view_rx) = watch::channel(SessionView::idle());
        let (actor, _deliveries) = SessionActor::new(
            Arc::new(remote),
            CollectionSpec::chat_history(),
            Arc::new(relay),
            Arc::new(LocalMirror::new()),
            view_tx,
        );
        (actor, events)
    }

    async fn settle(
        session: &SyncSession,
        mut pred: impl FnMut(&SessionView) -> bool,
    ) -> SessionView {
        let mut views = session.observe();
        let view = tokio::time::timeout(Duration::from_secs(2), views.wait_for(|v| pred(v)))
            .await
            .expect("session did not settle")
            .expect("session task stopped");
        (*view).clone()
    }

    // ===========================================
    // Session Actor Tests (deliveries injected directly)
    // ===========================================

    #[tokio::test]
    async fn late_snapshot_from_previous_subject_is_discarded() {
        let (mut actor, _events) = test_actor(MemoryRemote::new());

        actor.set_subject(Some(alice()));
        let first = actor.generations.current();
        actor.set_subject(Some(bob()));
        let second = actor.generations.current();

        actor.on_snapshot(first, snapshot_of(&["a1", "a2", "a3", "a4"]));
        assert!(actor.mirror.is_empty());
        assert_eq!(actor.state, SessionState::Loading { generation: second });

        actor.on_snapshot(second, snapshot_of(&["b1"]));
        let mirrored = actor.mirror.read();
        assert_eq!(mirrored.len(), 1);
        assert!(mirrored.contains(&RecordId::from("b1")));
    }

    #[tokio::test]
    async fn error_keeps_last_snapshot_and_notifies_once() {
        let (mut actor, mut events) = test_actor(MemoryRemote::new());
        actor.set_subject(Some(alice()));
        let generation = actor.generations.current();
        actor.on_snapshot(generation, snapshot_of(&["a1", "a2"]));

        actor.on_error(generation, RemoteError::PermissionDenied("revoked".into()));

        assert!(actor.state.is_failed());
        assert_eq!(actor.mirror.len(), 2);
        let event = events.try_recv().unwrap();
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.operation, Operation::Sync);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_error_is_ignored() {
        let (mut actor, mut events) = test_actor(MemoryRemote::new());
        actor.set_subject(Some(alice()));
        let old = actor.generations.current();
        actor.set_subject(Some(bob()));

        actor.on_error(old, RemoteError::Unavailable("offline".into()));

        assert!(actor.state.is_loading());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispose_makes_queued_deliveries_stale() {
        let (mut actor, _events) = test_actor(MemoryRemote::new());
        actor.set_subject(Some(alice()));
        let generation = actor.generations.current();

        actor.dispose();
        actor.on_snapshot(generation, snapshot_of(&["a1"]));

        assert!(actor.state.is_idle());
        assert!(actor.mirror.is_empty());
        assert!(actor.subscription.is_none());
    }

    // ===========================================
    // SyncSession Tests
    // ===========================================

    #[tokio::test]
    async fn session_starts_idle() {
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(
            Arc::new(MemoryRemote::new()),
            CollectionSpec::chat_history(),
            Arc::new(relay),
        );

        assert!(session.state().is_idle());
        assert!(session.subject().is_none());
        assert!(session.current_snapshot().is_empty());
        assert!(session.collection_ref().path().is_none());
    }

    #[tokio::test]
    async fn set_subject_syncs_existing_records() {
        let remote = MemoryRemote::new();
        let spec = CollectionSpec::chat_history();
        remote.seed(&spec.path_for(&alice()), vec![draft(3), draft(1), draft(2)]);
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(Arc::new(remote), spec, Arc::new(relay));

        session.set_subject(Some(alice())).await.unwrap();
        let view = settle(&session, |v| v.state.is_synced()).await;

        assert_eq!(view.subject, Some(alice()));
        let keys: Vec<i64> = view.snapshot.iter().map(|r| r.ordering_key.as_millis()).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(session.current_snapshot().len(), 3);
    }

    #[tokio::test]
    async fn set_subject_resets_mirror_before_returning() {
        let remote = MemoryRemote::new();
        let spec = CollectionSpec::chat_history();
        remote.seed(&spec.path_for(&alice()), vec![draft(1), draft(2)]);
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(Arc::new(remote), spec, Arc::new(relay));

        session.set_subject(Some(alice())).await.unwrap();
        settle(&session, |v| v.state.is_synced()).await;
        assert_eq!(session.current_snapshot().len(), 2);

        session.set_subject(Some(bob())).await.unwrap();

        assert_eq!(session.subject(), Some(bob()));
        assert!(session.current_snapshot().is_empty());
        assert!(!session.state().is_idle());
    }

    #[tokio::test]
    async fn same_subject_is_a_no_op() {
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(
            Arc::new(MemoryRemote::new()),
            CollectionSpec::chat_history(),
            Arc::new(relay),
        );

        session.set_subject(Some(alice())).await.unwrap();
        let generation = session.generation();
        session.set_subject(Some(alice())).await.unwrap();

        assert_eq!(session.generation(), generation);
    }

    #[tokio::test]
    async fn clearing_subject_goes_idle() {
        let remote = MemoryRemote::new();
        let spec = CollectionSpec::chat_history();
        let path = spec.path_for(&alice());
        remote.seed(&path, vec![draft(1)]);
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(Arc::new(remote.clone()), spec, Arc::new(relay));

        session.set_subject(Some(alice())).await.unwrap();
        settle(&session, |v| v.state.is_synced()).await;
        session.set_subject(None).await.unwrap();

        assert!(session.state().is_idle());
        assert!(session.current_snapshot().is_empty());
        tokio::task::yield_now().await;
        assert_eq!(remote.subscriber_count(&path), 0);
    }

    #[tokio::test]
    async fn subscribe_failure_moves_to_failed_with_one_event() {
        let remote = MemoryRemote::new();
        remote.fail_next_subscribe(RemoteError::PermissionDenied("no access".into()));
        let (relay, mut events) = ChannelRelay::new();
        let session = SyncSession::new(
            Arc::new(remote),
            CollectionSpec::uploads(),
            Arc::new(relay),
        );

        session.set_subject(Some(alice())).await.unwrap();
        settle(&session, |v| v.state.is_failed()).await;

        let event = events.recv().await.unwrap();
        assert!(event.is_error());
        assert!(matches!(
            event.detail,
            mirror_sync_types::NotificationDetail::Failed {
                kind: ErrorKind::Transport,
                ..
            }
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(
            Arc::new(MemoryRemote::new()),
            CollectionSpec::chat_history(),
            Arc::new(relay),
        );
        session.set_subject(Some(alice())).await.unwrap();

        session.dispose().await;
        session.dispose().await;

        assert!(session.is_disposed());
        assert!(session.state().is_idle());
        assert!(matches!(
            session.set_subject(Some(bob())).await,
            Err(SyncError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn dispose_without_subject_is_safe() {
        let (relay, _events) = ChannelRelay::new();
        let session = SyncSession::new(
            Arc::new(MemoryRemote::new()),
            CollectionSpec::chat_history(),
            Arc::new(relay),
        );

        session.dispose().await;
        assert!(session.is_disposed());
    }
}
