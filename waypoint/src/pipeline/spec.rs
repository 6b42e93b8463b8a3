//! Stage specifications.

use crate::config::DEFAULT_LOCK_TTL;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::StageHandler;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Specification for a single stage in a pipeline.
///
/// The name is the persistence key of the stage's result. Renaming a stage
/// in a deployed pipeline makes in-flight runs treat it as never executed,
/// so its handler runs again on resume.
#[derive(Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The bound handler. A spec without a handler fails at run time.
    pub handler: Option<Arc<dyn StageHandler>>,
    /// How long the stage may hold its execution lock.
    pub lock_ttl: Duration,
}

impl StageSpec {
    /// Creates a stage specification with no handler and the default TTL.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Binds the handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn StageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the lock TTL.
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Returns true if a handler is bound.
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the lock TTL is zero.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Stage name cannot be empty or whitespace-only",
            )
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-EMPTY_STAGE_NAME", "Empty stage name")
                    .with_fix_hint("Stage names are persistence keys; give every stage a stable name."),
            ));
        }

        if self.lock_ttl.is_zero() {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' has a zero lock TTL",
                self.name
            ))
            .with_stages(vec![self.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-ZERO_TTL", "Lock TTL must be positive")
                    .with_context_entry("stage", self.name.clone())
                    .with_fix_hint("Use a TTL longer than the stage's expected execution time."),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("has_handler", &self.handler.is_some())
            .field("lock_ttl", &self.lock_ttl)
            .finish()
    }
}
