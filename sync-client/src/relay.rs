//! Notification relays.
//!
//! The sync layer emits [`Notification`]s as data and hands them to a relay.
//! What happens next (a toast, a log line, a push message) is up to the
//! relay's owner.

use mirror_sync_types::{Notification, Severity};
use tokio::sync::mpsc;

/// Receives structured success/failure events.
///
/// `notify` is called inline from session and gateway code and must not block.
pub trait NotificationRelay: Send + Sync {
    /// Deliver one event.
    fn notify(&self, notification: Notification);
}

/// Forwards events into an unbounded channel.
///
/// Sends after the receiver is dropped are silently discarded.
#[derive(Debug, Clone)]
pub struct ChannelRelay {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelRelay {
    /// Create a relay and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationRelay for ChannelRelay {
    fn notify(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

/// Writes events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRelay;

impl NotificationRelay for TracingRelay {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => tracing::info!(
                operation = ?notification.operation,
                detail = ?notification.detail,
                "sync notification"
            ),
            Severity::Error => tracing::warn!(
                operation = ?notification.operation,
                detail = ?notification.detail,
                "sync failure"
            ),
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRelay;

impl NotificationRelay for NullRelay {
    fn notify(&self, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_sync_types::{ErrorKind, Operation};

    #[tokio::test]
    async fn channel_relay_forwards_in_order() {
        let (relay, mut events) = ChannelRelay::new();
        relay.notify(Notification::failure(
            Operation::Add,
            None,
            ErrorKind::NoSubject,
            "first",
        ));
        relay.notify(Notification::failure(
            Operation::Delete,
            None,
            ErrorKind::NoSubject,
            "second",
        ));

        assert_eq!(events.recv().await.unwrap().operation, Operation::Add);
        assert_eq!(events.recv().await.unwrap().operation, Operation::Delete);
    }

    #[test]
    fn channel_relay_tolerates_dropped_receiver() {
        let (relay, events) = ChannelRelay::new();
        drop(events);
        relay.notify(Notification::failure(
            Operation::Sync,
            None,
            ErrorKind::Transport,
            "nobody listening",
        ));
    }

    #[test]
    fn relays_are_object_safe() {
        let relays: Vec<Box<dyn NotificationRelay>> =
            vec![Box::new(TracingRelay), Box::new(NullRelay)];
        for relay in relays {
            relay.notify(Notification::failure(
                Operation::Clear,
                None,
                ErrorKind::Transport,
                "x",
            ));
        }
    }
}
