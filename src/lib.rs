//! Voice Dispatch: extracts call and task records from workflow output and
//! publishes them to a real-time event bus.

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod records;
pub mod workflow;
