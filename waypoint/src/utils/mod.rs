//! Run id helpers.

mod run_id;

pub use run_id::{new_run_id, validate_run_id};
