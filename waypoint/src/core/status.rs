//! Stage completion status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The persisted status of a stage within one run.
///
/// The only transition is `Init -> Done`; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// The stage has not completed for this run.
    #[default]
    Init,
    /// The stage completed and its data is immutable.
    Done,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
