//! Error types for the waypoint engine.
//!
//! Every failure of a run surfaces to the caller of `run()`. The engine
//! only suppresses lock-release failures, which are logged instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for waypoint operations.
#[derive(Debug, Error)]
pub enum WaypointError {
    /// The stage lock is held by another executor.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// A stage has no bound handler.
    #[error("{0}")]
    MissingHandler(#[from] MissingHandlerError),

    /// The checkpoint store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A stage handler returned an error or panicked.
    #[error("{0}")]
    Handler(#[from] HandlerError),

    /// The pipeline definition or run arguments are invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),
}

impl WaypointError {
    /// Returns true if calling `run()` again later may succeed.
    ///
    /// Conflicts clear once the holder releases or the TTL expires, and a
    /// failed handler is re-invoked verbatim on the next run.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Handler(_))
    }

    /// Suggested delay before retrying, present only for conflicts.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Conflict(err) => Some(err.retry_after),
            _ => None,
        }
    }

    /// Name of the stage the error is attributed to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Conflict(err) => Some(&err.stage),
            Self::MissingHandler(err) => Some(&err.stage),
            Self::Handler(err) => Some(&err.stage),
            Self::Store(_) | Self::Validation(_) => None,
        }
    }
}

/// Error raised when a stage lock could not be acquired.
#[derive(Debug, Clone, Error)]
#[error("Cannot get exclusive lock for {stage}:{run_id} (retry after {}ms)", retry_after.as_millis())]
pub struct ConflictError {
    /// The run identifier.
    pub run_id: String,
    /// The stage whose lock is held.
    pub stage: String,
    /// Suggested delay before retrying: half of the stage's lock TTL.
    pub retry_after: Duration,
}

impl ConflictError {
    /// Creates a conflict error for a stage with the given lock TTL.
    #[must_use]
    pub fn new(run_id: impl Into<String>, stage: impl Into<String>, lock_ttl: Duration) -> Self {
        Self {
            run_id: run_id.into(),
            stage: stage.into(),
            retry_after: lock_ttl / 2,
        }
    }
}

/// Error raised when a stage has no handler bound to it.
#[derive(Debug, Clone, Error)]
#[error("Cannot find handler for stage {stage}")]
pub struct MissingHandlerError {
    /// The stage name.
    pub stage: String,
}

impl MissingHandlerError {
    /// Creates a new missing handler error.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
        }
    }
}

/// Error raised by stage business logic.
#[derive(Debug, Error)]
#[error("Unable to execute stage {stage}:{run_id}: {source}")]
pub struct HandlerError {
    /// The run identifier.
    pub run_id: String,
    /// The stage that failed.
    pub stage: String,
    /// The underlying error returned by the handler.
    #[source]
    pub source: anyhow::Error,
}

impl HandlerError {
    /// Wraps a handler failure.
    #[must_use]
    pub fn new(run_id: impl Into<String>, stage: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            run_id: run_id.into(),
            stage: stage.into(),
            source,
        }
    }
}

/// Errors raised by checkpoint store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O operation failed.
    #[error("Checkpoint store I/O error while {context}: {source}")]
    Io {
        /// What the store was doing.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Stage data could not be serialized.
    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend service reported a failure.
    #[error("Checkpoint backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates an I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-DUPLICATE_STAGE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition or run request is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if one was attached.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Convenience result alias.
pub type Result<T, E = WaypointError> = std::result::Result<T, E>;
