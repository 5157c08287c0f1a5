use async_trait::async_trait;
use duel_types::{RoomEvent, RoomId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Destination for committed room notifications.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, room_id: RoomId, event: RoomEvent) -> anyhow::Result<()>;
}

/// Fans every event out to all registered sinks. A failing sink does not
/// stop delivery to the others; all failures come back as one error for the
/// caller to log.
#[derive(Default, Clone)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, room_id: RoomId, event: RoomEvent) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.publish(room_id, event.clone()).await {
                failures.push(format!("{:#}", e));
            }
        }

        if !failures.is_empty() {
            anyhow::bail!(
                "{} of {} sinks failed: {}",
                failures.len(),
                self.sinks.len(),
                failures.join("; ")
            );
        }
        Ok(())
    }
}

/// Logs events instead of delivering them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, room_id: RoomId, event: RoomEvent) -> anyhow::Result<()> {
        debug!(%room_id, event = event.kind(), "{:?}", event);
        Ok(())
    }
}

/// Deliver events in order, best effort. Failures are logged and swallowed:
/// the state change that produced them is already committed.
pub async fn publish_all(sink: &dyn EventSink, room_id: RoomId, events: Vec<RoomEvent>) {
    for event in events {
        let kind = event.kind();
        if let Err(e) = sink.publish(room_id, event).await {
            warn!(%room_id, event = kind, "Failed to publish room event: {:#}", e);
        }
    }
}
