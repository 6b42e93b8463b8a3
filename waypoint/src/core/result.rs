//! Persisted stage results.

use super::StageStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// All persisted stage results of one run, keyed by stage name.
pub type Snapshot = HashMap<String, StageResult>;

/// The checkpointed result of one stage within one run.
///
/// Serialized as `{"status": "done", "data": ...}`. `data` is only present
/// once the stage is done.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageResult {
    /// Completion status.
    #[serde(default)]
    pub status: StageStatus,
    /// The value the stage produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StageResult {
    /// Creates a completed result carrying `data`.
    #[must_use]
    pub fn done(data: Value) -> Self {
        Self {
            status: StageStatus::Done,
            data: Some(data),
        }
    }

    /// Creates a result for a stage that has not completed.
    #[must_use]
    pub fn init() -> Self {
        Self::default()
    }

    /// Returns true if the stage completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// Returns the completed data, treating a done stage without data as null.
    #[must_use]
    pub fn done_data(&self) -> Option<Value> {
        self.is_done()
            .then(|| self.data.clone().unwrap_or(Value::Null))
    }
}
