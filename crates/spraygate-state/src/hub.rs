//! Fan-out hub for subscriber messages.
//!
//! Uses [`tokio::sync::broadcast`] so every subscriber receives every
//! message without any single subscriber blocking the others. Delivery is
//! fire-and-forget: a slow subscriber lags (dropping the oldest buffered
//! messages) until it errors out of the channel and is removed by its
//! connection task.

use spraygate_types::ServerMessage;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered messages per subscriber before the oldest are dropped.
const DEFAULT_CAPACITY: usize = 256;

/// Shared fan-out hub. Clone it cheaply; all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct BroadcastHub {
    sender: broadcast::Sender<ServerMessage>,
}

impl BroadcastHub {
    /// Create a hub with the given per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver `message` to every active subscriber.
    ///
    /// Returns the number of subscribers the message was handed to. Zero
    /// subscribers is a normal condition, not an error.
    pub fn publish(&self, message: ServerMessage) -> usize {
        match self.sender.send(message) {
            Ok(n) => n,
            Err(_) => {
                trace!("no subscribers connected, message dropped");
                0
            }
        }
    }

    /// Subscribe to all future messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.sender.subscribe()
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spraygate_types::{Position, SystemState};

    #[tokio::test]
    async fn publish_and_receive() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();

        let delivered = hub.publish(ServerMessage::StateUpdate(SystemState::default()));
        assert_eq!(delivered, 1);

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, ServerMessage::StateUpdate(_)));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() {
        let hub = BroadcastHub::default();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.publish(ServerMessage::PositionUpdate(Position { x: 1.0, y: 2.0 }));

        let m1 = rx1.recv().await.unwrap();
        let m2 = rx2.recv().await.unwrap();
        assert_eq!(m1, m2);
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let hub = BroadcastHub::default();
        let delivered = hub.publish(ServerMessage::StateUpdate(SystemState::default()));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking_publisher() {
        let hub = BroadcastHub::new(4);
        let mut slow = hub.subscribe();

        for _ in 0..100 {
            hub.publish(ServerMessage::StateUpdate(SystemState::default()));
        }

        // The slow subscriber observes a lag error rather than blocking.
        let result = slow.recv().await;
        assert!(matches!(
            result,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
        ));
    }
}
