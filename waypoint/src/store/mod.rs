//! Checkpoint stores.
//!
//! A checkpoint store is the only durable state of the engine. It maps a run
//! id to the results of the stages completed so far, and provides a timed
//! lock per `(run_id, stage)`.
//!
//! Two backends ship with the crate:
//! - [`MemoryCheckpointStore`] models a key-value service with atomic
//!   conditional sets and TTL expiry
//! - [`FileCheckpointStore`] keeps one JSON document per run on disk, with
//!   best-effort lock files

mod file;
mod keys;
mod memory;

pub use file::FileCheckpointStore;
pub use keys::KeyBuilder;
pub use memory::MemoryCheckpointStore;

use crate::core::{Snapshot, StageResult};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Protocol for checkpoint storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads every stage result recorded for `run_id`.
    ///
    /// Missing or unparseable data yields an empty snapshot. Only genuine
    /// backend failures are errors.
    async fn get_all(&self, run_id: &str) -> Result<Snapshot, StoreError>;

    /// Loads the result of a single stage.
    async fn get(&self, run_id: &str, stage: &str) -> Result<Option<StageResult>, StoreError> {
        Ok(self.get_all(run_id).await?.remove(stage))
    }

    /// Persists the result of a stage, replacing any previous value.
    ///
    /// The write must be durable before this returns.
    async fn set_result(
        &self,
        run_id: &str,
        stage: &str,
        result: StageResult,
    ) -> Result<(), StoreError>;

    /// Tries to take the lock for `(run_id, stage)` for `ttl`.
    ///
    /// Returns `false` if another holder's lock is still live. No two callers
    /// may observe `true` for the same key within one TTL window. A `ttl`
    /// the backend cannot represent as an expiry is a [`StoreError`].
    async fn acquire_lock(&self, run_id: &str, stage: &str, ttl: Duration)
        -> Result<bool, StoreError>;

    /// Releases the lock for `(run_id, stage)`. Releasing a lock that is not
    /// held or already expired is a no-op.
    ///
    /// Locks carry no owner token. Release removes whatever lock exists for
    /// the key, so a caller whose TTL ran out before it released can delete
    /// the lock of a newer holder. Pick a TTL longer than the stage takes.
    async fn release_lock(&self, run_id: &str, stage: &str) -> Result<(), StoreError>;
}
