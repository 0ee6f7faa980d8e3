use super::types::WorkflowEvent;
use crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY;
use tokio::sync::broadcast;

/// Fan-out publisher for workflow events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish without waiting on subscribers. Returns how many received it.
    pub fn publish(&self, event: WorkflowEvent) -> usize {
        // send() only errors when nobody is subscribed, which is fine
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(
                    event = event.name(),
                    order_id = event.order_id,
                    "No subscribers for workflow event"
                );
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
