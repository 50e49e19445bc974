// Topic-based publish-subscribe.
//
// `tokio::sync::broadcast` fans every envelope out to every subscriber;
// per-client topic filtering and the bounded-outbound-queue/overflow
// disconnect policy live in `rpc::connection`, which is the side that
// actually owns a slow-subscriber's socket. The bus itself never blocks a
// publisher on a subscriber and never holds a lock while delivering —
// `broadcast::Sender::send` already satisfies both.

use super::{envelope::Envelope, topic::Topic};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct Bus {
    sender: broadcast::Sender<Envelope>,
}
impl Bus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        topic: Topic,
        payload: serde_json::Value,
    ) {
        // Err just means there are currently no subscribers; not a failure.
        let _ = self.sender.send(Envelope::new(topic, payload));
    }
}
impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test_bus {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = Bus::new();
        let mut receiver = bus.subscribe();

        bus.publish(Topic::CameraConnected, serde_json::json!({"device": "camera0"}));

        let envelope = tokio::time::timeout(Duration::from_millis(50), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.params.topic, Topic::CameraConnected);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = Bus::new();
        bus.publish(Topic::SystemStartup, serde_json::json!({}));
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_copy() {
        let bus = Bus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(Topic::SnapshotTaken, serde_json::json!({"id": 1}));

        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
