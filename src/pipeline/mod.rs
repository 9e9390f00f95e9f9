//! Extraction and dispatch pipeline.
//!
//! Workflow text flows through:
//! 1. `extract()`: find candidate records in one of two encodings
//! 2. `classify()`: route by flags, validate, collect rejections
//! 3. `EventSink::publish()`: one frame per accepted record
//!
//! The caller gets a `DeliverySummary` back, never an error.

pub mod ids;
pub mod processor;
pub mod types;

pub use ids::TaskIds;
pub use processor::Pipeline;
pub use types::{DeliveryFailure, DeliverySummary, PublishedCounts};
