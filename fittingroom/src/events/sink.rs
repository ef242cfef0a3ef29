//! Event sink trait and implementations.

use crate::utils::{now_utc, Timestamp};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event, e.g. `generation.completed` with its payload.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without blocking.
    ///
    /// Implementations must not panic; failures are logged and dropped.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// A sink that writes events to `tracing`.
///
/// The `generationId` of the payload, when present, becomes a log field.
/// Failure events (type ending in `.failed`) are logged at `WARN` whatever
/// the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn record(&self, event_type: &str, data: Option<&Value>) {
        let generation_id = data
            .and_then(|d| d.get("generationId"))
            .and_then(Value::as_str)
            .unwrap_or("-");

        if event_type.ends_with(".failed") {
            warn!(event_type, generation_id, data = ?data, "Lifecycle event");
        } else if self.level <= Level::INFO {
            // `Level` orders TRACE > DEBUG > INFO, so this is INFO or coarser.
            info!(event_type, generation_id, data = ?data, "Lifecycle event");
        } else {
            debug!(event_type, generation_id, data = ?data, "Lifecycle event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }
}

/// An event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Event type, e.g. `generation.completed`.
    pub event_type: String,
    /// Payload.
    pub data: Option<Value>,
    /// When the sink received it.
    pub at: Timestamp,
}

/// A sink that keeps every event in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    recorded: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event_type: &str, data: Option<Value>) {
        self.recorded.lock().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
            at: now_utc(),
        });
    }

    /// Returns every event received so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.recorded.lock().clone()
    }

    /// Returns the event types in arrival order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.recorded
            .lock()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns the events of exactly `event_type`.
    #[must_use]
    pub fn of_type(&self, event_type: &str) -> Vec<RecordedEvent> {
        self.recorded
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns the number of events received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    /// Returns true if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.push(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.push(event_type, data);
    }
}
