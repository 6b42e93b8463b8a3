//! Pipeline builder with validation.

use super::{Pipeline, StageSpec};
use crate::core::Outcome;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::{AsyncFnHandler, FnHandler, StageHandler};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating validated pipelines.
///
/// Stages run in the order they are added.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    names: HashSet<String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or already used, or the TTL is
    /// zero.
    pub fn stage(
        mut self,
        name: impl Into<String>,
        lock_ttl: Duration,
        handler: Arc<dyn StageHandler>,
    ) -> Result<Self, PipelineValidationError> {
        let spec = StageSpec::new(name)
            .with_handler(handler)
            .with_lock_ttl(lock_ttl);
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Appends a stage. Alias of [`stage`](Self::stage).
    ///
    /// # Errors
    ///
    /// See [`stage`](Self::stage).
    pub fn then(
        self,
        name: impl Into<String>,
        lock_ttl: Duration,
        handler: Arc<dyn StageHandler>,
    ) -> Result<Self, PipelineValidationError> {
        self.stage(name, lock_ttl, handler)
    }

    /// Appends a stage backed by a synchronous closure.
    ///
    /// # Errors
    ///
    /// See [`stage`](Self::stage).
    pub fn stage_fn<F>(
        self,
        name: impl Into<String>,
        lock_ttl: Duration,
        func: F,
    ) -> Result<Self, PipelineValidationError>
    where
        F: Fn(Value, &Value) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        self.stage(name, lock_ttl, Arc::new(FnHandler::new(func)))
    }

    /// Appends a stage backed by an async closure.
    ///
    /// # Errors
    ///
    /// See [`stage`](Self::stage).
    pub fn stage_async<F, Fut>(
        self,
        name: impl Into<String>,
        lock_ttl: Duration,
        func: F,
    ) -> Result<Self, PipelineValidationError>
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
    {
        self.stage(name, lock_ttl, Arc::new(AsyncFnHandler::new(func)))
    }

    /// Appends a pre-built stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid or its name is already used.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.names.contains(&spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is already defined in pipeline '{}'",
                spec.name, self.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-DUPLICATE_STAGE",
                    format!("Duplicate stage '{}'", spec.name),
                )
                .with_context_entry("pipeline", self.name.clone())
                .with_fix_hint("Stage names key persisted results; each must be unique."),
            ));
        }

        self.names.insert(spec.name.clone());
        self.stages.push(spec);
        Ok(())
    }

    /// Builds the pipeline. A pipeline without stages is valid.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline::new(self.name, self.stages)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::PassThroughHandler;

    const TTL: Duration = Duration::from_secs(5);

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("orders");
        assert_eq!(builder.name(), "orders");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_preserves_order() {
        let pipeline = PipelineBuilder::new("orders")
            .stage("c", TTL, Arc::new(PassThroughHandler))
            .unwrap()
            .then("a", TTL, Arc::new(PassThroughHandler))
            .unwrap()
            .stage_fn("b", TTL, |input, _| Ok(Outcome::Continue(input)))
            .unwrap()
            .build();

        assert_eq!(pipeline.stage_names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_builder_duplicate_stage() {
        let err = PipelineBuilder::new("orders")
            .stage("a", TTL, Arc::new(PassThroughHandler))
            .unwrap()
            .stage("a", TTL, Arc::new(PassThroughHandler))
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-DUPLICATE_STAGE"));
        assert_eq!(err.stages, vec!["a".to_string()]);
    }

    #[test]
    fn test_builder_rejects_invalid_spec() {
        let result = PipelineBuilder::new("orders").stage("", TTL, Arc::new(PassThroughHandler));
        assert!(result.is_err());

        let result =
            PipelineBuilder::new("orders").stage("a", Duration::ZERO, Arc::new(PassThroughHandler));
        assert_eq!(result.unwrap_err().code(), Some("CONTRACT-ZERO_TTL"));
    }

    #[test]
    fn test_builder_spec_without_handler() {
        let mut builder = PipelineBuilder::new("orders");
        builder.add_stage_spec(StageSpec::new("unbound")).unwrap();

        let pipeline = builder.build();
        assert!(!pipeline.get("unbound").unwrap().has_handler());
    }

    #[test]
    fn test_builder_stage_async() {
        let pipeline = PipelineBuilder::new("orders")
            .stage_async("a", TTL, |input, _seed| async move { Ok(Outcome::Continue(input)) })
            .unwrap()
            .build();

        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_builder_empty_pipeline() {
        let pipeline = PipelineBuilder::new("empty").build();
        assert!(pipeline.is_empty());
    }
}
