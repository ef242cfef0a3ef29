//! Lifecycle events.
//!
//! The orchestrator and designer report what happened to each request
//! through an [`EventSink`]. Sinks are injected; there is no global sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// A submission passed stage 1 and was registered.
pub const GENERATION_SUBMITTED: &str = "generation.submitted";
/// The background video job was handed to the job pool.
pub const GENERATION_DISPATCHED: &str = "generation.dispatched";
/// The video is available.
pub const GENERATION_COMPLETED: &str = "generation.completed";
/// The background job failed, timed out or was cancelled.
pub const GENERATION_FAILED: &str = "generation.failed";
/// A caller asked for a running generation to stop.
pub const GENERATION_CANCEL_REQUESTED: &str = "generation.cancel_requested";
/// An inspiration image was generated and stored.
pub const INSPIRE_COMPLETED: &str = "inspire.completed";
