//! Key naming for key-value checkpoint backends.

/// Builds the keys a key-value backend stores snapshots and locks under.
///
/// Snapshots live at `{prefix}-{run_id}`; locks at
/// `{prefix}-{run_id}:{stage}:lock`, so releasing a lock can never touch
/// checkpoint data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Creates a key builder with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the snapshot document for a run.
    #[must_use]
    pub fn snapshot_key(&self, run_id: &str) -> String {
        format!("{}-{}", self.prefix, run_id)
    }

    /// Key of the lock entry for one stage of a run.
    #[must_use]
    pub fn lock_key(&self, run_id: &str, stage: &str) -> String {
        format!("{}-{}:{}:lock", self.prefix, run_id, stage)
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("stages")
    }
}
