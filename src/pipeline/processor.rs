//! Pipeline orchestrator: extract, classify, publish.
//!
//! **Never fails on upstream text.** Malformed input ends up in the
//! delivery summary; only transport problems are reported as failures.

use std::sync::Arc;

use tracing::{info, warn};

use super::ids::TaskIds;
use super::types::{DeliveryFailure, DeliverySummary};
use crate::classify::classify;
use crate::dispatch::{Envelope, EventSink, PublishOutcome};
use crate::error::TransportError;
use crate::extract::extract;
use crate::records::Topic;

/// Runs raw workflow text through extraction, classification and dispatch.
///
/// Cheap to share: every run keeps its own state, only the sink and the id
/// allocator are common.
pub struct Pipeline {
    sink: Arc<dyn EventSink>,
    ids: Arc<TaskIds>,
}

impl Pipeline {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_ids(sink, Arc::new(TaskIds::new()))
    }

    /// Share an id allocator with other pipelines.
    pub fn with_ids(sink: Arc<dyn EventSink>, ids: Arc<TaskIds>) -> Self {
        Self { sink, ids }
    }

    /// Process one piece of workflow output.
    pub async fn run(&self, raw_text: &str) -> DeliverySummary {
        let extraction = extract(raw_text);
        let mut summary = DeliverySummary {
            diagnostics: extraction.diagnostics.clone(),
            ..Default::default()
        };

        if extraction.is_unrecognized() {
            warn!(
                len = raw_text.len(),
                diagnostics = summary.diagnostics.len(),
                "No records could be extracted; echoing raw text"
            );
            summary.parse_failed = true;
            summary.raw_text = Some(raw_text.to_string());
            return summary;
        }

        let classification = classify(&extraction, || self.ids.next());
        summary.rejected = classification.rejected;

        for call in classification.calls {
            let sent = match Envelope::call(&call) {
                Ok(envelope) => self.sink.publish(envelope).await,
                Err(e) => Err(e.into()),
            };
            match sent {
                Ok(outcome) => {
                    summary.published.calls += 1;
                    if outcome == PublishOutcome::QueuedOffline {
                        summary.queued_offline += 1;
                    }
                    summary.calls.push(call);
                }
                Err(e) => record_failure(&mut summary, Topic::NewCall, call.name, e),
            }
        }

        for task in classification.tasks {
            let sent = match Envelope::task(&task) {
                Ok(envelope) => self.sink.publish(envelope).await,
                Err(e) => Err(e.into()),
            };
            match sent {
                Ok(outcome) => {
                    summary.published.tasks += 1;
                    if outcome == PublishOutcome::QueuedOffline {
                        summary.queued_offline += 1;
                    }
                    summary.tasks.push(task);
                }
                Err(e) => record_failure(&mut summary, Topic::NewTask, task.text, e),
            }
        }

        info!(
            calls = summary.published.calls,
            tasks = summary.published.tasks,
            queued = summary.queued_offline,
            rejected = summary.rejected.len(),
            failed = summary.failures.len(),
            "Pipeline run complete"
        );
        summary
    }
}

fn record_failure(summary: &mut DeliverySummary, topic: Topic, label: String, e: TransportError) {
    warn!(topic = %topic, label = %label, error = %e, "Record not delivered");
    summary.failures.push(DeliveryFailure {
        topic,
        label,
        error: e.to_string(),
    });
}
