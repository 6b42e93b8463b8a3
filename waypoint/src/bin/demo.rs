//! Runs a three-stage pipeline against a file store until it completes.
//!
//! The second stage pauses, so the first invocation stops after it and the
//! next one resumes at the third stage. Rerunning the binary with the same
//! `WAYPOINT_RUN_ID` replays every stage from disk.
//!
//! Environment:
//! - `WAYPOINT_DIR`: checkpoint directory (default: `<tmp>/waypoint-demo`)
//! - `WAYPOINT_RUN_ID`: run id (default: `random-id1`)
//! - `RUST_LOG`: log filter (default: `info`)

use anyhow::{anyhow, Context};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use waypoint::core::Outcome;
use waypoint::events::LoggingEventSink;
use waypoint::observability::{init_logging, LogFormat};
use waypoint::pipeline::{Pipeline, PipelineBuilder, PipelineEngine};
use waypoint::store::FileCheckpointStore;

const STAGE_TTL: Duration = Duration::from_secs(1);
const MAX_INVOCATIONS: usize = 5;

fn append(stage: &str, input: &Value) -> anyhow::Result<String> {
    info!(stage, "executing stage");
    let text = input
        .as_str()
        .ok_or_else(|| anyhow!("Cannot read input data"))?;
    Ok(format!("{text}{stage}"))
}

fn build_pipeline() -> anyhow::Result<Pipeline> {
    let pipeline = PipelineBuilder::new("demo")
        .stage_fn("first", STAGE_TTL, |input, _seed| {
            Ok(Outcome::next(append("first", &input)?))
        })?
        .stage_fn("second", STAGE_TTL, |input, _seed| {
            Ok(Outcome::pause(append("second", &input)?))
        })?
        .stage_async("third", STAGE_TTL, |input, seed| async move {
            info!(seed = %seed, "third stage sees the seed");
            Ok(Outcome::next(append("third", &input)?))
        })?
        .build();
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::Text, "info");

    let dir = std::env::var_os("WAYPOINT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("waypoint-demo"));
    let run_id = std::env::var("WAYPOINT_RUN_ID").unwrap_or_else(|_| "random-id1".to_string());

    let store = Arc::new(FileCheckpointStore::new(&dir));
    let engine = PipelineEngine::new(store).with_event_sink(Arc::new(LoggingEventSink::debug()));
    let pipeline = build_pipeline()?;

    info!(dir = %dir.display(), run_id = %run_id, "checkpoint store ready");

    for invocation in 1..=MAX_INVOCATIONS {
        let report = engine
            .run(&pipeline, &run_id, "seed")
            .await
            .with_context(|| format!("invocation {invocation} of run {run_id} failed"))?;

        info!(
            invocation,
            executed = ?report.executed,
            replayed = ?report.replayed,
            duration_ms = report.duration_ms,
            "invocation finished"
        );

        if let Some(stage) = report.paused_at() {
            info!(stage, value = %report.value, "run paused, resuming");
            continue;
        }

        println!("result = {}", report.value);
        return Ok(());
    }

    Err(anyhow!(
        "run {run_id} did not complete within {MAX_INVOCATIONS} invocations"
    ))
}
