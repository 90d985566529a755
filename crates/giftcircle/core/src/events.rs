use crate::ports::EventSink;
use crate::GiftResult;
use giftcircle_types::GiftEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: GiftEvent) -> GiftResult<()> {
        Ok(())
    }
}

/// Fan-out sink for in-process subscribers.
///
/// Slow subscribers lag and miss events rather than blocking writers. Having
/// no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<GiftEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GiftEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: GiftEvent) -> GiftResult<()> {
        // `send` only fails when nobody is listening.
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Emit after a committed write; failures are logged and swallowed.
pub(crate) fn publish(sink: &dyn EventSink, event: GiftEvent) {
    let name = event.name();
    if let Err(err) = sink.emit(event) {
        warn!(event = name, error = %err, "event emission failed");
    }
}
