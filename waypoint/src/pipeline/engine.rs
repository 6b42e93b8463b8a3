//! Checkpointed pipeline execution.

use super::{Pipeline, RunReport, RunStatus, StageSpec};
use crate::config::EngineConfig;
use crate::core::{Outcome, StageResult};
use crate::errors::{ConflictError, HandlerError, MissingHandlerError, Result};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::{duration_ms, SpanTimer};
use crate::stages::StageHandler;
use crate::store::CheckpointStore;
use crate::utils::validate_run_id;
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives runs of a [`Pipeline`] against a checkpoint store.
///
/// The engine keeps no state between calls. Any number of runs, for the
/// same or different run ids, may use one engine concurrently; stage locks
/// in the store are the only coordination between them.
#[derive(Clone)]
pub struct PipelineEngine {
    store: Arc<dyn CheckpointStore>,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
}

impl PipelineEngine {
    /// Creates an engine over `store` with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the checkpoint store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `pipeline` for `run_id`, resuming after the last completed stage.
    ///
    /// The snapshot is read once up front. Stages it shows as done are
    /// replayed from their persisted data; the rest execute in order, each
    /// receiving the previous stage's value and the seed. The first stage
    /// that pauses ends the invocation.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank run id, and otherwise the
    /// first stage or store failure. Stages completed before the failure
    /// stay persisted.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        run_id: &str,
        seed: impl Into<Value>,
    ) -> Result<RunReport> {
        validate_run_id(run_id)?;
        let seed = seed.into();
        let timer = SpanTimer::start(format!("run:{}", pipeline.name()));

        info!(
            run_id,
            pipeline = pipeline.name(),
            stages = pipeline.len(),
            "Starting pipeline run"
        );
        self.emit(
            events::RUN_STARTED,
            json!({"run_id": run_id, "pipeline": pipeline.name()}),
        )
        .await;

        let snapshot = self.store.get_all(run_id).await?;

        let mut acc = seed.clone();
        let mut executed = Vec::new();
        let mut replayed = Vec::new();

        for stage in pipeline.stages() {
            if let Some(data) = snapshot.get(&stage.name).and_then(StageResult::done_data) {
                debug!(run_id, stage = %stage.name, "Replaying completed stage");
                self.emit(
                    events::STAGE_REPLAYED,
                    json!({"run_id": run_id, "stage": stage.name}),
                )
                .await;
                replayed.push(stage.name.clone());
                acc = data;
                continue;
            }

            let outcome = self.execute_stage(run_id, stage, acc, &seed).await?;
            executed.push(stage.name.clone());

            match outcome {
                Outcome::Continue(value) => acc = value,
                Outcome::Pause(value) => {
                    let duration_ms = timer.finish();
                    info!(run_id, stage = %stage.name, duration_ms, "Pipeline run paused");
                    self.emit(
                        events::RUN_PAUSED,
                        json!({"run_id": run_id, "stage": stage.name, "duration_ms": duration_ms}),
                    )
                    .await;
                    return Ok(RunReport {
                        value,
                        status: RunStatus::Paused {
                            stage: stage.name.clone(),
                        },
                        executed,
                        replayed,
                        duration_ms,
                    });
                }
            }
        }

        let duration_ms = timer.finish();
        info!(
            run_id,
            executed = executed.len(),
            replayed = replayed.len(),
            duration_ms,
            "Pipeline run completed"
        );
        self.emit(
            events::RUN_COMPLETED,
            json!({"run_id": run_id, "duration_ms": duration_ms}),
        )
        .await;

        Ok(RunReport {
            value: acc,
            status: RunStatus::Completed,
            executed,
            replayed,
            duration_ms,
        })
    }

    /// Executes one stage under its lock and persists the outcome.
    ///
    /// The lock is released on every exit path once acquired. Both
    /// `Continue` and `Pause` outcomes are persisted as done.
    ///
    /// # Errors
    ///
    /// - `MissingHandler` if no handler is bound; no lock is taken
    /// - `Conflict` if the lock is held elsewhere
    /// - `Handler` if the handler fails or panics; nothing is persisted
    /// - `Store` if locking or persistence fails
    pub async fn execute_stage(
        &self,
        run_id: &str,
        stage: &StageSpec,
        input: Value,
        seed: &Value,
    ) -> Result<Outcome> {
        let Some(handler) = stage.handler.as_ref() else {
            warn!(run_id, stage = %stage.name, "No handler bound to stage");
            return Err(MissingHandlerError::new(&stage.name).into());
        };

        let acquired = self
            .store
            .acquire_lock(run_id, &stage.name, stage.lock_ttl)
            .await?;
        if !acquired {
            let err = ConflictError::new(run_id, &stage.name, stage.lock_ttl);
            warn!(
                run_id,
                stage = %stage.name,
                retry_after_ms = duration_ms(err.retry_after),
                "Stage lock is held by another executor"
            );
            self.emit(
                events::STAGE_CONFLICT,
                json!({"run_id": run_id, "stage": stage.name}),
            )
            .await;
            return Err(err.into());
        }

        debug!(
            run_id,
            stage = %stage.name,
            ttl_ms = duration_ms(stage.lock_ttl),
            "Executing stage"
        );
        self.emit(
            events::STAGE_STARTED,
            json!({"run_id": run_id, "stage": stage.name}),
        )
        .await;

        let timer = SpanTimer::start(stage.name.clone());
        let result = self
            .invoke_and_persist(run_id, stage, handler.as_ref(), input, seed)
            .await;
        self.release(run_id, &stage.name).await;
        let duration_ms = timer.finish();

        match &result {
            Ok(outcome) => {
                let event_type = if outcome.is_pause() {
                    events::STAGE_PAUSED
                } else {
                    events::STAGE_COMPLETED
                };
                debug!(run_id, stage = %stage.name, duration_ms, paused = outcome.is_pause(), "Stage done");
                self.emit(
                    event_type,
                    json!({"run_id": run_id, "stage": stage.name, "duration_ms": duration_ms}),
                )
                .await;
            }
            Err(err) => {
                warn!(run_id, stage = %stage.name, duration_ms, error = %err, "Stage failed");
                self.emit(
                    events::STAGE_FAILED,
                    json!({
                        "run_id": run_id,
                        "stage": stage.name,
                        "error": err.to_string(),
                        "duration_ms": duration_ms,
                    }),
                )
                .await;
            }
        }

        result
    }

    async fn invoke_and_persist(
        &self,
        run_id: &str,
        stage: &StageSpec,
        handler: &dyn StageHandler,
        input: Value,
        seed: &Value,
    ) -> Result<Outcome> {
        let call = handler.handle(input, seed);
        let handled = if self.config.catch_panics {
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(handled) => handled,
                Err(payload) => Err(anyhow::anyhow!(
                    "stage handler panicked: {}",
                    panic_message(payload.as_ref())
                )),
            }
        } else {
            call.await
        };

        let outcome = handled.map_err(|source| HandlerError::new(run_id, &stage.name, source))?;

        self.store
            .set_result(run_id, &stage.name, StageResult::done(outcome.value().clone()))
            .await?;

        Ok(outcome)
    }

    async fn release(&self, run_id: &str, stage: &str) {
        let release = self.store.release_lock(run_id, stage);
        match tokio::time::timeout(self.config.release_timeout(), release).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(run_id, stage, error = %err, "Cannot release execution lock");
            }
            Err(_) => {
                warn!(
                    run_id,
                    stage,
                    timeout_ms = self.config.release_timeout_ms,
                    "Timed out releasing execution lock"
                );
            }
        }
    }

    async fn emit(&self, event_type: &str, data: Value) {
        if self.config.emit_events {
            self.events.emit(event_type, data).await;
        }
    }
}

impl fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{StoreError, WaypointError};
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::stages::{FnHandler, PassThroughHandler};
    use crate::store::{MemoryCheckpointStore, MockCheckpointStore};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(10);

    fn spec(name: &str) -> StageSpec {
        StageSpec::new(name)
            .with_handler(Arc::new(PassThroughHandler))
            .with_lock_ttl(TTL)
    }

    #[tokio::test]
    async fn test_execute_stage_persists_and_releases() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = PipelineEngine::new(store.clone());

        let outcome = engine
            .execute_stage("run", &spec("a"), json!(1), &json!(0))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Continue(json!(1)));
        assert_eq!(
            store.get("run", "a").await.unwrap(),
            Some(StageResult::done(json!(1)))
        );
        assert!(!store.is_locked("run", "a"));
    }

    #[tokio::test]
    async fn test_execute_stage_conflict() {
        let store = Arc::new(MemoryCheckpointStore::new());
        store.acquire_lock("run", "a", TTL).await.unwrap();
        let engine = PipelineEngine::new(store.clone());

        let err = engine
            .execute_stage("run", &spec("a"), json!(1), &json!(0))
            .await
            .unwrap_err();

        assert!(matches!(err, WaypointError::Conflict(_)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        // The other holder's lock is untouched.
        assert!(store.is_locked("run", "a"));
        assert!(store.get("run", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_handler_takes_no_lock() {
        let mut store = MockCheckpointStore::new();
        store.expect_acquire_lock().never();
        let engine = PipelineEngine::new(Arc::new(store));

        let err = engine
            .execute_stage("run", &StageSpec::new("orphan"), json!(null), &json!(null))
            .await
            .unwrap_err();

        assert!(matches!(err, WaypointError::MissingHandler(_)));
        assert_eq!(err.stage(), Some("orphan"));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_releases_lock() {
        let mut store = MockCheckpointStore::new();
        store.expect_acquire_lock().times(1).returning(|_, _, _| Ok(true));
        store
            .expect_set_result()
            .times(1)
            .returning(|_, _, _| Err(StoreError::backend("write refused")));
        store.expect_release_lock().times(1).returning(|_, _| Ok(()));
        let engine = PipelineEngine::new(Arc::new(store));

        let err = engine
            .execute_stage("run", &spec("a"), json!(1), &json!(0))
            .await
            .unwrap_err();

        assert!(matches!(err, WaypointError::Store(_)));
    }

    #[tokio::test]
    async fn test_release_failure_is_not_propagated() {
        let mut store = MockCheckpointStore::new();
        store.expect_acquire_lock().returning(|_, _, _| Ok(true));
        store.expect_set_result().returning(|_, _, _| Ok(()));
        store
            .expect_release_lock()
            .times(1)
            .returning(|_, _| Err(StoreError::backend("connection reset")));
        let engine = PipelineEngine::new(Arc::new(store));

        let outcome = engine
            .execute_stage("run", &spec("a"), json!("v"), &json!(null))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Continue(json!("v")));
    }

    #[tokio::test]
    async fn test_handler_error_persists_nothing() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = PipelineEngine::new(store.clone());
        let failing = StageSpec::new("a")
            .with_handler(Arc::new(FnHandler::new(|_, _| Err(anyhow::anyhow!("boom")))));

        let err = engine
            .execute_stage("run", &failing, json!(1), &json!(0))
            .await
            .unwrap_err();

        assert!(matches!(err, WaypointError::Handler(_)));
        assert!(err.to_string().contains("boom"));
        assert!(store.get("run", "a").await.unwrap().is_none());
        assert!(!store.is_locked("run", "a"));
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_lock_released() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = PipelineEngine::new(store.clone());
        let panicking = StageSpec::new("a").with_handler(Arc::new(FnHandler::new(|_, _| {
            panic!("handler exploded");
        })));

        let err = engine
            .execute_stage("run", &panicking, json!(1), &json!(0))
            .await
            .unwrap_err();

        assert!(matches!(err, WaypointError::Handler(_)));
        assert!(err.to_string().contains("handler exploded"));
        assert!(!store.is_locked("run", "a"));
    }

    #[tokio::test]
    async fn test_blank_run_id_rejected_before_store_access() {
        let mut store = MockCheckpointStore::new();
        store.expect_get_all().never();
        let engine = PipelineEngine::new(Arc::new(store));
        let pipeline = PipelineBuilder::new("p").build();

        let err = engine.run(&pipeline, " ", json!(null)).await.unwrap_err();
        assert!(matches!(err, WaypointError::Validation(_)));
    }

    #[tokio::test]
    async fn test_snapshot_read_failure_propagates() {
        let mut store = MockCheckpointStore::new();
        store
            .expect_get_all()
            .returning(|_| Err(StoreError::backend("unreachable")));
        let engine = PipelineEngine::new(Arc::new(store));
        let pipeline = PipelineBuilder::new("p").build();

        let err = engine.run(&pipeline, "run", json!(null)).await.unwrap_err();
        assert!(matches!(err, WaypointError::Store(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_fails_run_without_running_stage() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = PipelineEngine::new(store.clone());
        let pipeline = PipelineBuilder::new("p")
            .stage("a", Duration::MAX, Arc::new(PassThroughHandler))
            .unwrap()
            .build();

        let err = engine.run(&pipeline, "run", json!(1)).await.unwrap_err();

        assert!(matches!(err, WaypointError::Store(_)));
        assert!(!store.is_locked("run", "a"));
        assert!(store.get("run", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = PipelineEngine::new(store).with_event_sink(sink.clone());
        let pipeline = PipelineBuilder::new("p")
            .stage("a", TTL, Arc::new(PassThroughHandler))
            .unwrap()
            .build();

        engine.run(&pipeline, "run", json!(1)).await.unwrap();
        engine.run(&pipeline, "run", json!(1)).await.unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                "run.started",
                "stage.started",
                "stage.completed",
                "run.completed",
                "run.started",
                "stage.replayed",
                "run.completed",
            ]
        );
    }

    #[tokio::test]
    async fn test_events_can_be_disabled() {
        let sink = Arc::new(CollectingEventSink::new());
        let store = Arc::new(MemoryCheckpointStore::new());
        let engine = PipelineEngine::new(store)
            .with_config(EngineConfig::new().with_emit_events(false))
            .with_event_sink(sink.clone());
        let pipeline = PipelineBuilder::new("p")
            .stage("a", TTL, Arc::new(PassThroughHandler))
            .unwrap()
            .build();

        engine.run(&pipeline, "run", json!(1)).await.unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}
