//! Canonical call and task records and their validation rules.

pub mod model;
pub mod validate;

pub use model::{CallRecord, Priority, TaskRecord, TaskStatus, Topic};
pub use validate::{validate_call, validate_task};
