//! # Waypoint
//!
//! Resumable, crash-recoverable staged pipelines with external checkpoints.
//!
//! A pipeline is an ordered list of named stages. Each stage's result is
//! persisted to a [`CheckpointStore`](store::CheckpointStore) under the run
//! id, so calling `run()` again with the same id skips completed stages and
//! continues where the previous invocation stopped:
//!
//! - **Checkpointing**: every completed stage is stored before the next runs
//! - **Pause and resume**: a stage may pause the run; the next call resumes
//!   after it
//! - **Mutual exclusion**: each stage executes under a timed lock, so two
//!   executors never run the same stage of the same run at once
//! - **Observability**: `tracing` spans and fields plus an event sink
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use waypoint::prelude::*;
//!
//! # async fn demo() -> waypoint::errors::Result<()> {
//! let pipeline = PipelineBuilder::new("orders")
//!     .stage_fn("reserve", Duration::from_secs(30), |input, _seed| {
//!         Ok(Outcome::next(input))
//!     })?
//!     .stage_fn("approve", Duration::from_secs(30), |input, _seed| {
//!         Ok(Outcome::pause(input))
//!     })?
//!     .build();
//!
//! let engine = PipelineEngine::new(Arc::new(MemoryCheckpointStore::new()));
//! let report = engine.run(&pipeline, "order-42", "seed").await?;
//! assert!(report.is_paused());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EngineConfig, FileStoreConfig, MemoryStoreConfig, DEFAULT_LOCK_TTL};
    pub use crate::core::{Outcome, Snapshot, StageResult, StageStatus};
    pub use crate::errors::{
        ConflictError, ContractErrorInfo, HandlerError, MissingHandlerError,
        PipelineValidationError, StoreError, WaypointError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        Pipeline, PipelineBuilder, PipelineEngine, RunReport, RunStatus, StageSpec,
    };
    pub use crate::stages::{AsyncFnHandler, FnHandler, PassThroughHandler, StageHandler};
    pub use crate::store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
    pub use crate::utils::new_run_id;
}
