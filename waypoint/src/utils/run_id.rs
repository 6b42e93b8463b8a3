//! Run id generation and validation.

use crate::errors::{ContractErrorInfo, PipelineValidationError};
use uuid::Uuid;

/// Generates a fresh, time-ordered run id.
///
/// Callers resuming a run must reuse the id of the original invocation.
#[must_use]
pub fn new_run_id() -> String {
    Uuid::now_v7().to_string()
}

/// Rejects empty or whitespace-only run ids.
pub fn validate_run_id(run_id: &str) -> Result<(), PipelineValidationError> {
    if run_id.trim().is_empty() {
        return Err(PipelineValidationError::new(
            "Run id cannot be empty or whitespace-only",
        )
        .with_error_info(
            ContractErrorInfo::new("CONTRACT-EMPTY_RUN_ID", "Empty run id")
                .with_fix_hint("Pass the id identifying the logical pipeline instance to resume."),
        ));
    }
    Ok(())
}
