//! Test assertions for persisted snapshots.

use crate::core::Snapshot;
use serde_json::Value;

/// Asserts that `stage` is done with `expected` as its data.
pub fn assert_stage_done(snapshot: &Snapshot, stage: &str, expected: &Value) {
    let result = snapshot.get(stage).unwrap_or_else(|| {
        panic!(
            "Expected stage '{}' in snapshot, found stages: {:?}",
            stage,
            snapshot.keys().collect::<Vec<_>>()
        )
    });
    assert!(
        result.is_done(),
        "Expected stage '{}' to be done, got status: {:?}",
        stage,
        result.status
    );
    assert_eq!(
        result.data.as_ref(),
        Some(expected),
        "Unexpected data for stage '{}'",
        stage
    );
}

/// Asserts that `stage` has no completed result.
pub fn assert_stage_pending(snapshot: &Snapshot, stage: &str) {
    assert!(
        snapshot.get(stage).map_or(true, |result| !result.is_done()),
        "Expected stage '{}' to be pending, got: {:?}",
        stage,
        snapshot.get(stage)
    );
}

/// Asserts that exactly `stages` are done, in any order.
pub fn assert_snapshot_done(snapshot: &Snapshot, stages: &[&str]) {
    let mut done: Vec<&str> = snapshot
        .iter()
        .filter(|(_, result)| result.is_done())
        .map(|(name, _)| name.as_str())
        .collect();
    done.sort_unstable();

    let mut expected = stages.to_vec();
    expected.sort_unstable();

    assert_eq!(done, expected, "Unexpected set of completed stages");
}
