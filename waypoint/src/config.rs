//! Configuration types for the engine and the bundled checkpoint stores.

use crate::observability::duration_ms;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Lock TTL used by stages that do not specify one.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Configuration for the pipeline engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Convert handler panics into handler errors so the stage lock is
    /// still released.
    #[serde(default = "default_catch_panics")]
    pub catch_panics: bool,
    /// Upper bound on a single lock release call in milliseconds. A release
    /// that times out is logged; the lock then expires via its TTL.
    #[serde(default = "default_release_timeout_ms")]
    pub release_timeout_ms: u64,
    /// Forward run and stage events to the engine's event sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
}

fn default_catch_panics() -> bool {
    true
}

fn default_release_timeout_ms() -> u64 {
    5_000
}

fn default_emit_events() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catch_panics: default_catch_panics(),
            release_timeout_ms: default_release_timeout_ms(),
            emit_events: default_emit_events(),
        }
    }
}

impl EngineConfig {
    /// Creates a new engine configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether handler panics are caught.
    #[must_use]
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Sets the release timeout.
    #[must_use]
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout_ms = duration_ms(timeout);
        self
    }

    /// Enables or disables event emission.
    #[must_use]
    pub fn with_emit_events(mut self, emit: bool) -> Self {
        self.emit_events = emit;
        self
    }

    /// Returns the release timeout as a duration.
    #[must_use]
    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }
}

/// Configuration for the file-backed checkpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Directory holding one snapshot document per run plus lock files.
    pub dir: PathBuf,
    /// Write indented JSON.
    #[serde(default)]
    pub pretty: bool,
}

impl FileStoreConfig {
    /// Creates a configuration rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pretty: false,
        }
    }

    /// Sets pretty printing.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Configuration for the in-memory key-value checkpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Prefix for every key the store writes.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "stages".to_string()
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

impl MemoryStoreConfig {
    /// Sets the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}
