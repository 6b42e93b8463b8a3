//! Core domain model types for waypoint.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage status enum as persisted in checkpoints
//! - The handler outcome sum type
//! - Persisted stage results and run snapshots

mod outcome;
mod result;
mod status;

pub use outcome::Outcome;
pub use result::{Snapshot, StageResult};
pub use status::StageStatus;
