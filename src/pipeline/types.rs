//! Shared types for the extraction and dispatch pipeline.

use serde::Serialize;

use crate::error::ValidationError;
use crate::records::{CallRecord, TaskRecord, Topic};

// ── Delivery summary ────────────────────────────────────────────────

/// Records accepted by the sink, per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishedCounts {
    pub calls: usize,
    pub tasks: usize,
}

impl PublishedCounts {
    pub fn total(&self) -> usize {
        self.calls + self.tasks
    }
}

/// A record the sink refused.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub topic: Topic,
    /// Human label: call name or task text.
    pub label: String,
    pub error: String,
}

/// Result of one pipeline run, for the messaging gateway to acknowledge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliverySummary {
    pub published: PublishedCounts,
    /// Subset of `published` held in the offline backlog.
    pub queued_offline: usize,
    pub rejected: Vec<ValidationError>,
    pub failures: Vec<DeliveryFailure>,
    /// Neither encoding matched.
    pub parse_failed: bool,
    /// Original text, echoed only when parsing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    /// Records accepted by the sink, in publish order.
    pub calls: Vec<CallRecord>,
    pub tasks: Vec<TaskRecord>,
    /// Extractor diagnostics.
    pub diagnostics: Vec<String>,
}

impl DeliverySummary {
    /// True when at least one record could not be handed to the transport.
    pub fn transport_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Human-readable acknowledgment.
    pub fn render(&self) -> String {
        if self.parse_failed {
            return format!(
                "Could not extract any records from the response:\n{}",
                self.raw_text.as_deref().unwrap_or_default()
            );
        }

        let mut out = String::new();
        if self.published.total() == 0 && self.rejected.is_empty() && self.failures.is_empty() {
            out.push_str("No calls or tasks to dispatch.");
            return out;
        }

        out.push_str(&format!(
            "Published {} call(s) and {} task(s).",
            self.published.calls, self.published.tasks
        ));
        if self.queued_offline > 0 {
            out.push_str(&format!(
                " {} queued until the event bus reconnects.",
                self.queued_offline
            ));
        }

        if !self.calls.is_empty() {
            out.push_str("\n\nCalls:\n");
            out.push_str(&pretty(&self.calls));
        }
        if !self.tasks.is_empty() {
            out.push_str("\n\nTasks:\n");
            out.push_str(&pretty(&self.tasks));
        }

        if !self.rejected.is_empty() {
            out.push_str("\n\nSkipped:");
            for e in &self.rejected {
                out.push_str(&format!("\n- {}: {}", e.field, e.reason));
            }
        }

        if !self.failures.is_empty() {
            out.push_str("\n\nNot delivered:");
            for f in &self.failures {
                out.push_str(&format!("\n- {} \"{}\": {}", f.topic, f.label, f.error));
            }
        }

        out
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Priority;

    #[test]
    fn render_parse_failure_echoes_text() {
        let summary = DeliverySummary {
            parse_failed: true,
            raw_text: Some("hello there".into()),
            ..Default::default()
        };
        let text = summary.render();
        assert!(text.starts_with("Could not extract"));
        assert!(text.ends_with("hello there"));
    }

    #[test]
    fn render_nothing_to_dispatch() {
        assert_eq!(
            DeliverySummary::default().render(),
            "No calls or tasks to dispatch."
        );
    }

    #[test]
    fn render_lists_records_rejections_and_failures() {
        let summary = DeliverySummary {
            published: PublishedCounts { calls: 0, tasks: 1 },
            queued_offline: 1,
            tasks: vec![TaskRecord::new(9, "Buy milk", Priority::Low)],
            rejected: vec![ValidationError::new("name", "missing or empty call name")],
            failures: vec![DeliveryFailure {
                topic: Topic::NewCall,
                label: "Standup".into(),
                error: "Channel is offline".into(),
            }],
            ..Default::default()
        };
        let text = summary.render();
        assert!(text.contains("Published 0 call(s) and 1 task(s)."));
        assert!(text.contains("1 queued"));
        assert!(text.contains("\"Buy milk\""));
        assert!(text.contains("- name: missing or empty call name"));
        assert!(text.contains("- new-call \"Standup\": Channel is offline"));
        assert!(summary.transport_failed());
    }
}
