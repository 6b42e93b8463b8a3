//! Built pipeline definitions.

use super::{PipelineEngine, RunReport, StageSpec};
use crate::errors::Result;
use crate::store::CheckpointStore;
use serde_json::Value;
use std::sync::Arc;

/// An ordered, immutable sequence of stages.
///
/// A pipeline holds no run-scoped state and may be shared across runs and
/// tasks.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
}

impl Pipeline {
    pub(crate) fn new(name: String, stages: Vec<StageSpec>) -> Self {
        Self { name, stages }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|spec| spec.name.as_str()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|spec| spec.name == name)
    }

    /// Runs the pipeline with a default engine.
    ///
    /// # Errors
    ///
    /// See [`PipelineEngine::run`].
    pub async fn run(
        &self,
        store: Arc<dyn CheckpointStore>,
        run_id: &str,
        seed: impl Into<Value>,
    ) -> Result<RunReport> {
        PipelineEngine::new(store).run(self, run_id, seed).await
    }
}
