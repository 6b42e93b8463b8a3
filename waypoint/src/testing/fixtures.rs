//! Store wrappers and pipeline fixtures for testing.

use super::RecordingHandler;
use crate::core::{Snapshot, StageResult};
use crate::errors::StoreError;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::store::CheckpointStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Call counts observed by a [`CountingStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    /// `get_all` calls.
    pub get_all: usize,
    /// `set_result` calls.
    pub set_result: usize,
    /// `acquire_lock` calls.
    pub acquire_lock: usize,
    /// `release_lock` calls.
    pub release_lock: usize,
}

/// A store wrapper that counts calls per operation.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    get_all: AtomicUsize,
    set_result: AtomicUsize,
    acquire_lock: AtomicUsize,
    release_lock: AtomicUsize,
}

impl<S: CheckpointStore> CountingStore<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            get_all: AtomicUsize::new(0),
            set_result: AtomicUsize::new(0),
            acquire_lock: AtomicUsize::new(0),
            release_lock: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the counts observed so far.
    #[must_use]
    pub fn counts(&self) -> StoreCallCounts {
        StoreCallCounts {
            get_all: self.get_all.load(Ordering::SeqCst),
            set_result: self.set_result.load(Ordering::SeqCst),
            acquire_lock: self.acquire_lock.load(Ordering::SeqCst),
            release_lock: self.release_lock.load(Ordering::SeqCst),
        }
    }

    /// Resets every count to zero.
    pub fn reset(&self) {
        for counter in [
            &self.get_all,
            &self.set_result,
            &self.acquire_lock,
            &self.release_lock,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<S: CheckpointStore> CheckpointStore for CountingStore<S> {
    async fn get_all(&self, run_id: &str) -> Result<Snapshot, StoreError> {
        self.get_all.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all(run_id).await
    }

    async fn set_result(
        &self,
        run_id: &str,
        stage: &str,
        result: StageResult,
    ) -> Result<(), StoreError> {
        self.set_result.fetch_add(1, Ordering::SeqCst);
        self.inner.set_result(run_id, stage, result).await
    }

    async fn acquire_lock(
        &self,
        run_id: &str,
        stage: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.acquire_lock.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire_lock(run_id, stage, ttl).await
    }

    async fn release_lock(&self, run_id: &str, stage: &str) -> Result<(), StoreError> {
        self.release_lock.fetch_add(1, Ordering::SeqCst);
        self.inner.release_lock(run_id, stage).await
    }
}

/// A store wrapper that fails selected operations on demand.
///
/// Failures are switched on and off at runtime so a test can break the
/// store mid-run and then repair it.
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    fail_get_all: AtomicBool,
    fail_set_result: AtomicBool,
    fail_release: AtomicBool,
}

impl<S: CheckpointStore> FaultyStore<S> {
    /// Wraps `inner` with every fault disabled.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_get_all: AtomicBool::new(false),
            fail_set_result: AtomicBool::new(false),
            fail_release: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Makes snapshot reads fail.
    pub fn fail_get_all(&self, fail: bool) {
        self.fail_get_all.store(fail, Ordering::SeqCst);
    }

    /// Makes result writes fail.
    pub fn fail_set_result(&self, fail: bool) {
        self.fail_set_result.store(fail, Ordering::SeqCst);
    }

    /// Makes lock releases fail. The inner lock stays held until its TTL.
    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: CheckpointStore> CheckpointStore for FaultyStore<S> {
    async fn get_all(&self, run_id: &str) -> Result<Snapshot, StoreError> {
        if self.fail_get_all.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected get_all failure"));
        }
        self.inner.get_all(run_id).await
    }

    async fn set_result(
        &self,
        run_id: &str,
        stage: &str,
        result: StageResult,
    ) -> Result<(), StoreError> {
        if self.fail_set_result.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected set_result failure"));
        }
        self.inner.set_result(run_id, stage, result).await
    }

    async fn acquire_lock(
        &self,
        run_id: &str,
        stage: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.inner.acquire_lock(run_id, stage, ttl).await
    }

    async fn release_lock(&self, run_id: &str, stage: &str) -> Result<(), StoreError> {
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected release failure"));
        }
        self.inner.release_lock(run_id, stage).await
    }
}

/// A pipeline whose stages each append `-{name}` to the accumulator.
///
/// Stage `i` is handled by `handlers[i]`, so tests can inspect the inputs
/// and seeds every stage received.
#[derive(Debug, Clone)]
pub struct TestPipeline {
    /// The built pipeline.
    pub pipeline: Pipeline,
    /// One recording handler per stage, in stage order.
    pub handlers: Vec<Arc<RecordingHandler>>,
}

impl TestPipeline {
    /// Lock TTL used by every fixture stage.
    pub const LOCK_TTL: Duration = Duration::from_secs(30);

    /// Builds a pipeline of appending stages named after `stages`.
    ///
    /// # Panics
    ///
    /// Panics if `stages` contains a duplicate or blank name.
    #[must_use]
    pub fn appending(stages: &[&str]) -> Self {
        Self::build(stages, None)
    }

    /// Like [`appending`](Self::appending), but the stage named `pause_at`
    /// pauses instead of continuing.
    ///
    /// # Panics
    ///
    /// Panics if `stages` contains a duplicate or blank name.
    #[must_use]
    pub fn pausing_at(stages: &[&str], pause_at: &str) -> Self {
        Self::build(stages, Some(pause_at))
    }

    fn build(stages: &[&str], pause_at: Option<&str>) -> Self {
        let mut builder = PipelineBuilder::new("test-pipeline");
        let mut handlers = Vec::with_capacity(stages.len());

        for name in stages {
            let handler = if pause_at == Some(*name) {
                Arc::new(RecordingHandler::pausing(*name))
            } else {
                Arc::new(RecordingHandler::new(*name))
            };
            builder = match builder.stage(*name, Self::LOCK_TTL, handler.clone()) {
                Ok(builder) => builder,
                Err(err) => panic!("invalid fixture stage '{name}': {err}"),
            };
            handlers.push(handler);
        }

        Self {
            pipeline: builder.build(),
            handlers,
        }
    }

    /// Returns the handler for the named stage.
    #[must_use]
    pub fn handler(&self, stage: &str) -> Option<&Arc<RecordingHandler>> {
        self.pipeline
            .stages()
            .iter()
            .position(|spec| spec.name == stage)
            .and_then(|index| self.handlers.get(index))
    }

    /// Returns the total number of handler calls across all stages.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.handlers.iter().map(|handler| handler.call_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCheckpointStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_counting_store() {
        let store = CountingStore::new(MemoryCheckpointStore::new());
        store.get_all("run").await.unwrap();
        store
            .set_result("run", "a", StageResult::done(json!(1)))
            .await
            .unwrap();
        store
            .acquire_lock("run", "a", Duration::from_secs(1))
            .await
            .unwrap();
        store.release_lock("run", "a").await.unwrap();

        assert_eq!(
            store.counts(),
            StoreCallCounts {
                get_all: 1,
                set_result: 1,
                acquire_lock: 1,
                release_lock: 1,
            }
        );

        store.reset();
        assert_eq!(store.counts(), StoreCallCounts::default());
    }

    #[tokio::test]
    async fn test_faulty_store_toggles() {
        let store = FaultyStore::new(MemoryCheckpointStore::new());
        store.fail_set_result(true);
        assert!(store
            .set_result("run", "a", StageResult::done(json!(1)))
            .await
            .is_err());

        store.fail_set_result(false);
        store
            .set_result("run", "a", StageResult::done(json!(1)))
            .await
            .unwrap();
        assert_eq!(store.inner().run_count(), 1);
    }

    #[test]
    fn test_pipeline_fixture() {
        let fixture = TestPipeline::pausing_at(&["a", "b"], "b");
        assert_eq!(fixture.pipeline.stage_names(), vec!["a", "b"]);
        assert_eq!(fixture.handlers.len(), 2);
        assert!(fixture.handler("b").is_some());
        assert_eq!(fixture.total_calls(), 0);
    }
}
