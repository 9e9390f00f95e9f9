//! Record classification: routes extracted candidates into calls and tasks.
//!
//! Delimited rows carry explicit routing: cell 0 is always the call list and
//! cell 1 the task list, each gated by its flag. Bracketed lists predate the
//! routing flags and every candidate in them is validated as a call.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::extract::{Candidates, ExtractionResult};
use crate::records::{CallRecord, TaskRecord, validate_call, validate_task};

/// Validated records plus everything that failed validation.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub calls: Vec<CallRecord>,
    pub tasks: Vec<TaskRecord>,
    pub rejected: Vec<ValidationError>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.tasks.is_empty()
    }
}

/// Classify an extraction. `next_id` stamps each task candidate.
///
/// Never fails: invalid candidates and inconsistent routing flags are
/// reported in `rejected`.
pub fn classify(result: &ExtractionResult, mut next_id: impl FnMut() -> u64) -> Classification {
    let mut out = Classification::default();

    match &result.candidates {
        Candidates::Bracketed(items) => {
            validate_calls(items, &mut out);
        }
        Candidates::Routed {
            calls,
            tasks,
            has_calls,
            has_tasks,
        } => {
            route(calls, *has_calls, "calls", &mut out);
            if *has_calls {
                validate_calls(calls, &mut out);
            }

            route(tasks, *has_tasks, "tasks", &mut out);
            if *has_tasks {
                for raw in tasks {
                    match validate_task(raw, next_id()) {
                        Ok(task) => out.tasks.push(task),
                        Err(e) => reject(e, raw, &mut out),
                    }
                }
            }
        }
        Candidates::None => {}
    }

    debug!(
        calls = out.calls.len(),
        tasks = out.tasks.len(),
        rejected = out.rejected.len(),
        "Classification complete"
    );
    out
}

fn validate_calls(items: &[Value], out: &mut Classification) {
    for raw in items {
        match validate_call(raw) {
            Ok(call) => out.calls.push(call),
            Err(e) => reject(e, raw, out),
        }
    }
}

/// Check a list against its routing flag.
fn route(items: &[Value], flag: bool, field: &str, out: &mut Classification) {
    if flag && items.is_empty() {
        let e = ValidationError::new(
            field,
            format!("routing flag is set but the {field} list is empty"),
        );
        warn!(field, "Routing flag set with no candidates");
        out.rejected.push(e);
    } else if !flag && !items.is_empty() {
        debug!(field, suppressed = items.len(), "Candidates suppressed by routing flag");
    }
}

fn reject(e: ValidationError, raw: &Value, out: &mut Classification) {
    warn!(field = %e.field, reason = %e.reason, candidate = %raw, "Rejected candidate");
    out.rejected.push(e);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::extract::extract;
    use crate::records::Priority;

    fn counter() -> impl FnMut() -> u64 {
        let mut n = 0;
        move || {
            n += 1;
            n
        }
    }

    fn routed(calls: Vec<Value>, tasks: Vec<Value>, has_calls: bool, has_tasks: bool) -> ExtractionResult {
        ExtractionResult {
            candidates: Candidates::Routed {
                calls,
                tasks,
                has_calls,
                has_tasks,
            },
            diagnostics: vec![],
        }
    }

    #[test]
    fn calls_only_when_flagged() {
        let result = routed(
            vec![json!({"name": "Standup"}), json!({"members": ["x"]})],
            vec![json!({"text": "Buy milk"})],
            true,
            false,
        );
        let out = classify(&result, counter());
        assert_eq!(out.calls.len(), 1);
        assert!(out.tasks.is_empty());
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].field, "name");
    }

    #[test]
    fn tasks_get_increasing_ids() {
        let result = routed(
            vec![],
            vec![
                json!({"text": "One", "priority": "LOW"}),
                json!({"text": "Two"}),
                json!({"title": "Three", "priority": "high"}),
            ],
            false,
            true,
        );
        let out = classify(&result, counter());
        let ids: Vec<u64> = out.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(out.tasks[0].priority, Priority::Low);
        assert_eq!(out.tasks[1].priority, Priority::Medium);
        assert_eq!(out.tasks[2].text, "Three");
    }

    #[test]
    fn flag_without_candidates_is_reported() {
        let result = routed(vec![json!({"name": "Sync"})], vec![], true, true);
        let out = classify(&result, counter());
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].field, "tasks");
    }

    #[test]
    fn false_flags_suppress_everything() {
        let result = routed(
            vec![json!({"name": "Sync"})],
            vec![json!({"text": "Do it"})],
            false,
            false,
        );
        let out = classify(&result, counter());
        assert!(out.is_empty());
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn bracketed_candidates_are_calls() {
        let result = extract("[{'name': 'Demo', 'time': '15:00'}, {'text': 'not a call'}]");
        let out = classify(&result, counter());
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].time, "15:00");
        assert!(out.tasks.is_empty());
        assert_eq!(out.rejected.len(), 1);
    }

    #[test]
    fn unrecognized_yields_nothing() {
        let out = classify(&extract("just words"), counter());
        assert!(out.is_empty());
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn non_mapping_candidates_rejected_not_panicking() {
        let result = routed(vec![json!(1), json!(null)], vec![json!("x")], true, true);
        let out = classify(&result, counter());
        assert!(out.is_empty());
        assert_eq!(out.rejected.len(), 3);
    }
}
