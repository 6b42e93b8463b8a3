//! Event sinks.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

/// Receives run and stage events from the engine.
///
/// Delivery problems are the sink's own concern; `emit` cannot fail a run.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one event. `payload` is a JSON object carrying `run_id` and,
    /// for stage events, `stage`.
    async fn emit(&self, event_type: &str, payload: Value);
}

/// Discards every event. The engine's default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _payload: Value) {}
}

/// Forwards events to `tracing` at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct LoggingEventSink {
    level: Level,
}

impl LoggingEventSink {
    /// Logs at `level`. Only `DEBUG` is distinguished; any other level logs
    /// at `INFO`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs at `DEBUG`.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, payload: Value) {
        if self.level == Level::DEBUG {
            debug!(event = event_type, payload = %payload, "waypoint event");
        } else {
            info!(event = event_type, payload = %payload, "waypoint event");
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    received: RwLock<Vec<(String, Value)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the received events with their payloads.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Value)> {
        self.received.read().clone()
    }

    /// Returns only the event types.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.received
            .read()
            .iter()
            .map(|(event_type, _)| event_type.clone())
            .collect()
    }

    /// Returns the number of received events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.received.read().len()
    }

    /// Returns true if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.received.read().is_empty()
    }

    /// Forgets every received event.
    pub fn clear(&self) {
        self.received.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, payload: Value) {
        self.received.write().push((event_type.to_string(), payload));
    }
}
