//! In-memory checkpoint store modelled on a key-value service.

use super::{CheckpointStore, KeyBuilder};
use crate::config::MemoryStoreConfig;
use crate::core::{Snapshot, StageResult};
use crate::errors::StoreError;
use crate::observability::duration_ms;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Checkpoint store backed by process memory.
///
/// Snapshots are kept as serialized JSON strings under their snapshot key,
/// the way a key-value service would hold them. Lock entries are
/// conditional-set keys with an expiry; an expired entry counts as absent.
#[derive(Debug)]
pub struct MemoryCheckpointStore {
    keys: KeyBuilder,
    values: DashMap<String, String>,
    locks: DashMap<String, Instant>,
}

impl MemoryCheckpointStore {
    /// Creates a new empty store with the default key prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&MemoryStoreConfig::default())
    }

    /// Creates a new empty store from configuration.
    #[must_use]
    pub fn with_config(config: &MemoryStoreConfig) -> Self {
        Self {
            keys: KeyBuilder::new(config.key_prefix.clone()),
            values: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Returns the key builder in use.
    #[must_use]
    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Returns the raw serialized snapshot for a run.
    #[must_use]
    pub fn raw(&self, run_id: &str) -> Option<String> {
        self.values
            .get(&self.keys.snapshot_key(run_id))
            .map(|value| value.clone())
    }

    /// Overwrites the raw serialized snapshot for a run.
    pub fn put_raw(&self, run_id: &str, raw: impl Into<String>) {
        self.values.insert(self.keys.snapshot_key(run_id), raw.into());
    }

    /// Returns true if a live lock entry exists for the stage.
    #[must_use]
    pub fn is_locked(&self, run_id: &str, stage: &str) -> bool {
        self.locks
            .get(&self.keys.lock_key(run_id, stage))
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }

    /// Returns the number of runs with a stored snapshot.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.values.len()
    }

    /// Removes every snapshot and lock.
    pub fn clear(&self) {
        self.values.clear();
        self.locks.clear();
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_snapshot(key: &str, raw: &str) -> Snapshot {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(key, error = %err, "Discarding unparseable checkpoint snapshot");
        Snapshot::new()
    })
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get_all(&self, run_id: &str) -> Result<Snapshot, StoreError> {
        let key = self.keys.snapshot_key(run_id);
        let snapshot = self
            .values
            .get(&key)
            .map(|raw| parse_snapshot(&key, raw.value()))
            .unwrap_or_default();
        Ok(snapshot)
    }

    async fn set_result(
        &self,
        run_id: &str,
        stage: &str,
        result: StageResult,
    ) -> Result<(), StoreError> {
        let key = self.keys.snapshot_key(run_id);

        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.values.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let mut snapshot = parse_snapshot(&key, entry.get());
                snapshot.insert(stage.to_string(), result);
                entry.insert(serde_json::to_string(&snapshot)?);
            }
            Entry::Vacant(entry) => {
                let mut snapshot = Snapshot::new();
                snapshot.insert(stage.to_string(), result);
                entry.insert(serde_json::to_string(&snapshot)?);
            }
        }

        debug!(run_id, stage, "Stored stage result");
        Ok(())
    }

    async fn acquire_lock(
        &self,
        run_id: &str,
        stage: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| StoreError::backend(format!("lock ttl out of range: {ttl:?}")))?;

        let acquired = match self.locks.entry(self.keys.lock_key(run_id, stage)) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    false
                } else {
                    entry.insert(expires_at);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        };

        debug!(run_id, stage, acquired, ttl_ms = duration_ms(ttl), "Lock attempt");
        Ok(acquired)
    }

    async fn release_lock(&self, run_id: &str, stage: &str) -> Result<(), StoreError> {
        self.locks.remove(&self.keys.lock_key(run_id, stage));
        Ok(())
    }
}
