//! In-process fan-out of [`DomainEvent`]s backed by a tokio broadcast channel.

use domain::DomainEvent;
use tokio::sync::broadcast;

/// Publishing never fails: with no subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // send only errors when nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_to_every_subscriber() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DomainEvent::transport_status(true));

        assert_eq!(rx1.recv().await.unwrap().event_type(), "TransportStatusChanged");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "TransportStatusChanged");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        bus.publish(DomainEvent::console_output("boot"));
    }
}
