//! Candidate validation: turns untyped mappings into records.

use serde_json::{Map, Value};

use super::model::{CallRecord, Priority, TaskRecord};
use crate::error::ValidationError;

/// Validate a call candidate.
///
/// Requires a non-blank `name`. Missing optional fields become empty strings
/// or an empty member list.
pub fn validate_call(raw: &Value) -> Result<CallRecord, ValidationError> {
    let map = as_mapping(raw)?;

    let name = scalar_string(map.get("name"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::new("name", "missing or empty call name"))?;

    Ok(CallRecord {
        name,
        members: members(map.get("members")),
        date: scalar_string(map.get("date")).unwrap_or_default(),
        time: scalar_string(map.get("time")).unwrap_or_default(),
        status: scalar_string(map.get("status")).filter(|s| !s.is_empty()),
    })
}

/// Validate a task candidate, stamping it with the given id.
///
/// The title is read from `text`, falling back to `title`. Any `id` key in the
/// candidate is ignored.
pub fn validate_task(raw: &Value, id: u64) -> Result<TaskRecord, ValidationError> {
    let map = as_mapping(raw)?;

    let text = ["text", "title"]
        .iter()
        .find_map(|key| scalar_string(map.get(*key)).filter(|s| !s.is_empty()))
        .ok_or_else(|| ValidationError::new("text", "missing or empty task text"))?;

    let priority = scalar_string(map.get("priority"))
        .map(|p| Priority::normalize(&p))
        .unwrap_or_default();

    Ok(TaskRecord::new(id, text, priority))
}

fn as_mapping(raw: &Value) -> Result<&Map<String, Value>, ValidationError> {
    raw.as_object().ok_or_else(|| {
        ValidationError::new("record", format!("expected a mapping, got {}", kind(raw)))
    })
}

/// Trimmed string form of a scalar. Lists, mappings and null yield `None`.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Members may arrive as a list or as a comma-separated string.
fn members(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| scalar_string(Some(item)))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::records::model::TaskStatus;

    #[test]
    fn call_with_all_fields() {
        let call = validate_call(&json!({
            "name": " Standup ",
            "members": ["Ann", "Bob"],
            "date": "2024-05-01",
            "time": "09:30",
            "status": "scheduled"
        }))
        .unwrap();
        assert_eq!(call.name, "Standup");
        assert_eq!(call.members, vec!["Ann", "Bob"]);
        assert_eq!(call.date, "2024-05-01");
        assert_eq!(call.time, "09:30");
        assert_eq!(call.status.as_deref(), Some("scheduled"));
    }

    #[test]
    fn call_missing_optionals_become_empty() {
        let call = validate_call(&json!({"name": "Sync"})).unwrap();
        assert!(call.members.is_empty());
        assert_eq!(call.date, "");
        assert_eq!(call.time, "");
        assert!(call.status.is_none());
    }

    #[test]
    fn call_members_from_comma_string() {
        let call = validate_call(&json!({"name": "Sync", "members": "Ann, Bob,, "})).unwrap();
        assert_eq!(call.members, vec!["Ann", "Bob"]);
    }

    #[test]
    fn call_without_name_rejected() {
        let err = validate_call(&json!({"members": ["Ann"]})).unwrap_err();
        assert_eq!(err.field, "name");

        let err = validate_call(&json!({"name": "   "})).unwrap_err();
        assert_eq!(err.field, "name");

        let err = validate_call(&json!({"name": null})).unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn non_mapping_rejected() {
        let err = validate_call(&json!("Standup")).unwrap_err();
        assert_eq!(err.field, "record");
        assert!(err.reason.contains("a string"));

        let err = validate_task(&json!([1, 2]), 1).unwrap_err();
        assert_eq!(err.field, "record");
    }

    #[test]
    fn task_defaults() {
        let task = validate_task(&json!({"text": "Buy milk"}), 7).unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn task_title_fallback_and_priority() {
        let task = validate_task(&json!({"title": "Call bank", "priority": "HIGH"}), 1).unwrap();
        assert_eq!(task.text, "Call bank");
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn task_ignores_upstream_id() {
        let task = validate_task(&json!({"id": 999, "text": "x"}), 3).unwrap();
        assert_eq!(task.id, 3);
    }

    #[test]
    fn task_without_text_rejected() {
        let err = validate_task(&json!({"priority": "low"}), 1).unwrap_err();
        assert_eq!(err.field, "text");

        let err = validate_task(&json!({"text": ""}), 1).unwrap_err();
        assert_eq!(err.field, "text");
    }
}
