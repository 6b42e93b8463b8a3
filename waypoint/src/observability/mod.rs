//! Observability utilities.

mod logging;

pub use logging::{duration_ms, init_logging, LogFormat, SpanTimer};
