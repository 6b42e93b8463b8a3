//! File-backed checkpoint store.

use super::CheckpointStore;
use crate::config::FileStoreConfig;
use crate::core::{Snapshot, StageResult};
use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Contents of a lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockFile {
    expires_at: DateTime<Utc>,
}

/// Checkpoint store keeping one JSON document per run in a directory.
///
/// Every `set_result` rewrites the whole snapshot through a temp file and a
/// rename, so a crash never leaves a half-written document. Writes from one
/// process are serialized; concurrent writers in different processes can
/// still lose updates.
///
/// Locks are lock files created with link-if-absent semantics and carrying
/// an expiry. A lock file past its expiry is reclaimed by the next caller.
/// Acquisition is serialized within the process; across processes the
/// reclaim step is not atomic, so lock correctness there is best-effort.
#[derive(Debug)]
pub struct FileCheckpointStore {
    config: FileStoreConfig,
    write_lock: Mutex<()>,
    lock_guard: Mutex<()>,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(FileStoreConfig::new(dir))
    }

    /// Creates a store from configuration.
    #[must_use]
    pub fn with_config(config: FileStoreConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
            lock_guard: Mutex::new(()),
        }
    }

    /// Returns the directory the store writes to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Path of the snapshot document for a run.
    #[must_use]
    pub fn snapshot_path(&self, run_id: &str) -> PathBuf {
        self.config.dir.join(format!("{}.json", encode_component(run_id)))
    }

    /// Path of the lock file for one stage of a run.
    #[must_use]
    pub fn lock_path(&self, run_id: &str, stage: &str) -> PathBuf {
        self.config.dir.join(format!(
            "{}.{}.lock",
            encode_component(run_id),
            encode_component(stage)
        ))
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.config.dir)
            .await
            .map_err(|e| StoreError::io("creating checkpoint dir", e))
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.config
            .dir
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }

    async fn write_durable(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| StoreError::io("creating temp checkpoint", e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io("writing temp checkpoint", e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::io("flushing temp checkpoint", e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io("syncing temp checkpoint", e))?;
        Ok(())
    }

    /// Creates the lock file only if absent. The content is written to a
    /// temp file first and hard-linked into place, so the lock never exists
    /// without its expiry.
    async fn try_create_lock(&self, path: &Path, ttl: Duration) -> Result<bool, StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::backend(format!("lock ttl out of range: {e}")))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::backend(format!("lock ttl out of range: {ttl}")))?;
        let body = serde_json::to_vec(&LockFile { expires_at })?;

        let temp = self.temp_path(path);
        Self::write_durable(&temp, &body).await?;

        let linked = fs::hard_link(&temp, path).await;
        if let Err(e) = fs::remove_file(&temp).await {
            debug!(path = %temp.display(), error = %e, "Failed to remove temp lock file");
        }

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io("creating lock file", e)),
        }
    }

    /// Returns true if the lock file is gone, past its expiry, or unreadable.
    async fn lock_is_stale(path: &Path) -> Result<bool, StoreError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(StoreError::io("reading lock file", e)),
        };

        match serde_json::from_slice::<LockFile>(&bytes) {
            Ok(lock) => Ok(lock.expires_at <= Utc::now()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Treating corrupt lock file as expired");
                Ok(true)
            }
        }
    }
}

/// Encodes an arbitrary id into a single safe file name component.
///
/// ASCII alphanumerics, `-` and `_` are kept; every other byte becomes
/// `%XX`. The encoding is injective, so distinct ids never share a file.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get_all(&self, run_id: &str) -> Result<Snapshot, StoreError> {
        let path = self.snapshot_path(run_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => return Err(StoreError::io("reading checkpoint", e)),
        };

        Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "Discarding unparseable checkpoint file");
            Snapshot::new()
        }))
    }

    async fn set_result(
        &self,
        run_id: &str,
        stage: &str,
        result: StageResult,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_dir().await?;

        let mut snapshot = self.get_all(run_id).await?;
        snapshot.insert(stage.to_string(), result);

        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(&snapshot)?
        } else {
            serde_json::to_vec(&snapshot)?
        };

        let path = self.snapshot_path(run_id);
        let temp = self.temp_path(&path);
        Self::write_durable(&temp, &bytes).await?;
        fs::rename(&temp, &path)
            .await
            .map_err(|e| StoreError::io("renaming checkpoint", e))?;

        debug!(run_id, stage, path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    async fn acquire_lock(
        &self,
        run_id: &str,
        stage: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        // Held across create, stale check, remove and re-create.
        let _guard = self.lock_guard.lock().await;
        self.ensure_dir().await?;
        let path = self.lock_path(run_id, stage);

        if self.try_create_lock(&path, ttl).await? {
            return Ok(true);
        }

        if !Self::lock_is_stale(&path).await? {
            return Ok(false);
        }

        debug!(run_id, stage, "Reclaiming expired lock file");
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("removing expired lock file", e)),
        }
        self.try_create_lock(&path, ttl).await
    }

    async fn release_lock(&self, run_id: &str, stage: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.lock_path(run_id, stage)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("removing lock file", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("random-id1"), "random-id1");
        assert_eq!(encode_component("a/b"), "a%2Fb");
        assert_eq!(encode_component(".."), "%2E%2E");
        assert_ne!(encode_component("a.b"), encode_component("a%2Eb"));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(store.get_all("run").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_result_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nested"));
        store
            .set_result("run", "first", StageResult::done(json!("s-a")))
            .await
            .unwrap();
        store
            .set_result("run", "second", StageResult::done(json!("s-a-b")))
            .await
            .unwrap();

        let reopened = FileCheckpointStore::new(dir.path().join("nested"));
        let snapshot = reopened.get_all("run").await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["second"].data, Some(json!("s-a-b")));
    }

    #[tokio::test]
    async fn test_document_format_and_no_temp_files_left() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::with_config(
            FileStoreConfig::new(dir.path()).with_pretty(true),
        );
        store
            .set_result("run", "first", StageResult::done(json!({"n": 1})))
            .await
            .unwrap();

        let text = std::fs::read_to_string(store.snapshot_path("run")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc, json!({"first": {"status": "done", "data": {"n": 1}}}));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        std::fs::write(store.snapshot_path("run"), b"garbage").unwrap();

        assert!(store.get_all("run").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_file_exclusive_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let ttl = Duration::from_secs(60);

        assert!(store.acquire_lock("run", "first", ttl).await.unwrap());
        assert!(!store.acquire_lock("run", "first", ttl).await.unwrap());
        assert!(store.lock_path("run", "first").exists());

        store.release_lock("run", "first").await.unwrap();
        assert!(!store.lock_path("run", "first").exists());
        store.release_lock("run", "first").await.unwrap();

        assert!(store.acquire_lock("run", "first", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_file_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        assert!(store
            .acquire_lock("run", "first", Duration::from_millis(10))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store
            .acquire_lock("run", "first", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .acquire_lock("run", "first", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_lock_does_not_touch_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store
            .set_result("run", "first", StageResult::done(json!(1)))
            .await
            .unwrap();
        store
            .acquire_lock("run", "first", Duration::from_secs(1))
            .await
            .unwrap();
        store.release_lock("run", "first").await.unwrap();

        assert!(store.get("run", "first").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reclaim_has_single_holder() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileCheckpointStore::new(dir.path()));

        for round in 0..50 {
            let stage = format!("stage-{round}");
            assert!(store
                .acquire_lock("run", &stage, Duration::from_millis(1))
                .await
                .unwrap());
            tokio::time::sleep(Duration::from_millis(5)).await;

            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let store = store.clone();
                    let stage = stage.clone();
                    tokio::spawn(async move {
                        store
                            .acquire_lock("run", &stage, Duration::from_secs(60))
                            .await
                            .unwrap()
                    })
                })
                .collect();

            let mut holders = 0;
            for task in tasks {
                if task.await.unwrap() {
                    holders += 1;
                }
            }
            assert_eq!(holders, 1, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        let result = store
            .acquire_lock("run", "first", Duration::from_secs(u64::MAX / 4000))
            .await;
        assert!(matches!(result, Err(StoreError::Backend(_))));

        let result = store.acquire_lock("run", "first", Duration::MAX).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));

        assert!(store
            .acquire_lock("run", "first", Duration::from_secs(60))
            .await
            .unwrap());
    }
}
