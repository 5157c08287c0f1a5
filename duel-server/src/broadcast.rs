use async_trait::async_trait;
use duel_core::EventSink;
use duel_types::{RoomEnvelope, RoomEvent, RoomId};
use tokio::sync::broadcast;
use tracing::debug;

/// Hands committed room events to whatever transport subscribes.
#[derive(Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<RoomEnvelope>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, room_id: RoomId, event: RoomEvent) -> anyhow::Result<()> {
        // No subscribers is not a delivery failure
        if self.sender.send(RoomEnvelope { room_id, event }).is_err() {
            debug!(%room_id, "No subscribers for room event");
        }
        Ok(())
    }
}
