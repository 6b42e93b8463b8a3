//! Mock stage handlers for testing.

use crate::core::Outcome;
use crate::stages::StageHandler;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One recorded handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The accumulator the handler received.
    pub input: Value,
    /// The run's seed.
    pub seed: Value,
}

/// A handler that appends `-{suffix}` to its input and records each call.
///
/// String inputs are extended directly; other values use their JSON text.
#[derive(Debug)]
pub struct RecordingHandler {
    suffix: String,
    pause: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingHandler {
    /// Creates a handler that continues with the suffixed input.
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            pause: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a handler that pauses with the suffixed input.
    #[must_use]
    pub fn pausing(suffix: impl Into<String>) -> Self {
        Self {
            pause: true,
            ..Self::new(suffix)
        }
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the most recent call.
    #[must_use]
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl StageHandler for RecordingHandler {
    async fn handle(&self, input: Value, seed: &Value) -> anyhow::Result<Outcome> {
        let text = match &input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.calls.lock().push(RecordedCall {
            input,
            seed: seed.clone(),
        });

        let value = Value::String(format!("{text}-{}", self.suffix));
        Ok(if self.pause {
            Outcome::Pause(value)
        } else {
            Outcome::Continue(value)
        })
    }
}

/// A handler that always fails.
#[derive(Debug)]
pub struct FailingHandler {
    message: String,
    calls: AtomicUsize,
}

impl FailingHandler {
    /// Creates a failing handler with the given error message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageHandler for FailingHandler {
    async fn handle(&self, _input: Value, _seed: &Value) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// A handler that panics.
#[derive(Debug)]
pub struct PanickingHandler {
    message: String,
}

impl PanickingHandler {
    /// Creates a handler that panics with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StageHandler for PanickingHandler {
    async fn handle(&self, _input: Value, _seed: &Value) -> anyhow::Result<Outcome> {
        panic!("{}", self.message);
    }
}

/// A handler that sleeps before passing its input through.
#[derive(Debug)]
pub struct SlowHandler {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowHandler {
    /// Creates a slow handler.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a slow handler with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Returns the number of calls that started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageHandler for SlowHandler {
    async fn handle(&self, input: Value, _seed: &Value) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Outcome::Continue(input))
    }
}
