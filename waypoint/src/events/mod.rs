//! Run and stage events.
//!
//! The engine reports progress to an [`EventSink`] in addition to its
//! `tracing` output. Event types are the constants below; payloads are JSON
//! objects carrying at least `run_id` and, for stage events, `stage`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run invocation began.
pub const RUN_STARTED: &str = "run.started";
/// Every stage is done; the run returned its final value.
pub const RUN_COMPLETED: &str = "run.completed";
/// A stage paused the run.
pub const RUN_PAUSED: &str = "run.paused";
/// A stage was skipped because the store already holds its result.
pub const STAGE_REPLAYED: &str = "stage.replayed";
/// A stage acquired its lock and its handler is about to run.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage continued and its result was persisted.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage paused and its result was persisted.
pub const STAGE_PAUSED: &str = "stage.paused";
/// A stage handler or its persistence failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// A stage lock was already held.
pub const STAGE_CONFLICT: &str = "stage.conflict";
