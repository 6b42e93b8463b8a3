//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications
//! - Pipeline builder with validation
//! - The checkpointing engine and its run reports

mod builder;
mod definition;
mod engine;
mod report;
mod spec;


pub use builder::PipelineBuilder;
pub use definition::Pipeline;
pub use engine::PipelineEngine;
pub use report::{RunReport, RunStatus};
pub use spec::StageSpec;
