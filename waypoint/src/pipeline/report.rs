//! Run reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a run invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunStatus {
    /// Every stage is done.
    Completed,
    /// A stage paused; the next invocation resumes after it.
    Paused {
        /// The stage that paused.
        stage: String,
    },
}

/// The result of one `run()` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The terminal value: the last stage's value on completion, or the
    /// pausing stage's value.
    pub value: Value,
    /// How the invocation ended.
    pub status: RunStatus,
    /// Stages whose handlers ran in this invocation.
    pub executed: Vec<String>,
    /// Stages whose results were taken from the store.
    pub replayed: Vec<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Returns true if the run paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(self.status, RunStatus::Paused { .. })
    }

    /// Returns true if every stage is done.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Returns the name of the pausing stage.
    #[must_use]
    pub fn paused_at(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Paused { stage } => Some(stage),
            RunStatus::Completed => None,
        }
    }

    /// Returns true if no handler ran.
    #[must_use]
    pub fn is_full_replay(&self) -> bool {
        self.executed.is_empty()
    }

    /// Consumes the report and returns the terminal value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}
