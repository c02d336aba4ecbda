//! In-process broadcast bus for [`CoreEvent`]s.

use tokio::sync::broadcast;

use super::CoreEvent;

/// Broadcast bus from the SDK core to the application layer.
///
/// Publishing never blocks and never fails: with no subscriber the event
/// is discarded, and a lagging subscriber loses the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    pub fn publish(&self, event: CoreEvent) {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(kind, receivers, "Published core event"),
            Err(_) => tracing::trace!(kind, "No subscribers for core event"),
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
