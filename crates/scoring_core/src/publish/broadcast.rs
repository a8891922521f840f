use tokio::sync::broadcast;

use super::{Notification, Publisher};

/// Fan-out publisher on a bounded tokio broadcast channel. A receiver that
/// falls more than `capacity` messages behind loses the oldest ones
/// (`RecvError::Lagged`); the sender never waits.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, notification: Notification) {
        let topic = notification.topic();
        // No subscribers is not an error
        if self.tx.send(notification).is_err() {
            tracing::trace!(topic, "notification dropped, no subscribers");
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _notification: Notification) {}
}
