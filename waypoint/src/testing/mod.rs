//! Testing utilities for waypoint pipelines.
//!
//! This module provides:
//! - Handlers that record, fail, panic or stall
//! - Store wrappers that count calls or inject failures
//! - Assertions over persisted snapshots

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_snapshot_done, assert_stage_done, assert_stage_pending};
pub use fixtures::{CountingStore, FaultyStore, StoreCallCounts, TestPipeline};
pub use mocks::{
    FailingHandler, PanickingHandler, RecordedCall, RecordingHandler, SlowHandler,
};
