//! Text extraction: raw workflow output to untyped candidate records.
//!
//! Two encodings are tried in a fixed order:
//! 1. Bracketed lists: every `[{...}]` substring in free text is decoded
//!    and the results concatenated in order of appearance.
//! 2. Delimited row: the last pipe-delimited data row of a table carries
//!    `calls | tasks | has_calls | has_tasks`.
//!
//! Lines that decode as delimited data rows are left to the second encoding,
//! so a table is never misread as free-floating bracketed lists. A pipe-heavy
//! line whose cells do not decode stays in the free text.

pub mod literal;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Shortest `[{ ... }]` span, across newlines.
static BRACKETED_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[\{.*?\}\]").unwrap());

/// Minimum non-empty cells for a line to count as a data row.
const MIN_ROW_FIELDS: usize = 4;

/// Characters a separator cell starts with (`---`, `:--`, `===`, `+--`).
const SEPARATOR_MARKERS: &[char] = &['-', ':', '=', '+'];

/// Which encoding produced the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    BracketedList,
    DelimitedRow,
    Unrecognized,
}

/// Candidates found in the text, shaped by the encoding that matched.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidates {
    /// Legacy encoding: one flat list, no routing flags.
    Bracketed(Vec<Value>),
    /// Table encoding: separate lists gated by routing flags.
    Routed {
        calls: Vec<Value>,
        tasks: Vec<Value>,
        has_calls: bool,
        has_tasks: bool,
    },
    /// Nothing recognizable.
    None,
}

/// Output of one extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub candidates: Candidates,
    /// Non-fatal problems hit along the way (undecodable spans, bad cells).
    pub diagnostics: Vec<String>,
}

impl ExtractionResult {
    pub fn encoding(&self) -> Encoding {
        match self.candidates {
            Candidates::Bracketed(_) => Encoding::BracketedList,
            Candidates::Routed { .. } => Encoding::DelimitedRow,
            Candidates::None => Encoding::Unrecognized,
        }
    }

    /// True when neither encoding matched.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self.candidates, Candidates::None)
    }

    pub fn has_calls(&self) -> bool {
        matches!(self.candidates, Candidates::Routed { has_calls: true, .. })
    }

    pub fn has_tasks(&self) -> bool {
        matches!(self.candidates, Candidates::Routed { has_tasks: true, .. })
    }

    /// Total candidates across all lists, regardless of routing.
    pub fn candidate_count(&self) -> usize {
        match &self.candidates {
            Candidates::Bracketed(items) => items.len(),
            Candidates::Routed { calls, tasks, .. } => calls.len() + tasks.len(),
            Candidates::None => 0,
        }
    }
}

/// Extract candidates from raw workflow text. Never fails.
pub fn extract(text: &str) -> ExtractionResult {
    let mut diagnostics = Vec::new();

    // Rows whose cells decode belong to the table; everything else is free text.
    let mut table_row = None;
    let mut free_lines = Vec::new();
    for line in text.lines() {
        let mut row_diagnostics = Vec::new();
        match is_data_row(line)
            .then(|| decode_row(line, &mut row_diagnostics))
            .flatten()
        {
            Some(candidates) => table_row = Some((line, candidates, row_diagnostics)),
            None => free_lines.push(line),
        }
    }

    let items = scan_bracketed(&free_lines.join("\n"), &mut diagnostics);
    if !items.is_empty() {
        debug!(count = items.len(), "Extracted candidates from bracketed lists");
        return ExtractionResult {
            candidates: Candidates::Bracketed(items),
            diagnostics,
        };
    }

    if let Some((row, candidates, row_diagnostics)) = table_row {
        diagnostics.extend(row_diagnostics);
        debug!(row = %row, "Extracted candidates from delimited row");
        return ExtractionResult {
            candidates,
            diagnostics,
        };
    }

    debug!(diagnostics = diagnostics.len(), "No recognizable encoding in text");
    ExtractionResult {
        candidates: Candidates::None,
        diagnostics,
    }
}

fn scan_bracketed(text: &str, diagnostics: &mut Vec<String>) -> Vec<Value> {
    let mut items = Vec::new();
    for found in BRACKETED_LIST.find_iter(text) {
        match literal::decode(found.as_str()) {
            Ok(Value::Array(list)) => items.extend(list),
            Ok(_) => diagnostics.push(format!("bracketed span is not a list: {}", found.as_str())),
            Err(e) => {
                warn!(span = %found.as_str(), error = %e, "Could not decode bracketed span");
                diagnostics.push(format!("could not decode '{}': {e}", found.as_str()));
            }
        }
    }
    items
}

fn row_fields(line: &str) -> Vec<&str> {
    line.split('|')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect()
}

fn is_separator(fields: &[&str]) -> bool {
    fields
        .iter()
        .all(|field| field.starts_with(SEPARATOR_MARKERS))
}

fn is_data_row(line: &str) -> bool {
    let fields = row_fields(line);
    fields.len() >= MIN_ROW_FIELDS && !is_separator(&fields)
}

/// Decode the first four cells of a data row. `None` when no cell decodes.
fn decode_row(line: &str, diagnostics: &mut Vec<String>) -> Option<Candidates> {
    let fields = row_fields(line);
    let mut decoded_any = false;

    let mut list_field = |index: usize, label: &str| -> Vec<Value> {
        match literal::decode(fields[index]) {
            Ok(Value::Array(items)) => {
                decoded_any = true;
                items
            }
            Ok(other) => {
                diagnostics.push(format!("{label} cell is not a list: {other}"));
                Vec::new()
            }
            Err(e) => {
                diagnostics.push(format!("could not decode {label} cell '{}': {e}", fields[index]));
                Vec::new()
            }
        }
    };
    let calls = list_field(0, "calls");
    let tasks = list_field(1, "tasks");

    let mut flag_field = |index: usize, label: &str| -> bool {
        match literal::decode(fields[index]) {
            Ok(Value::Bool(flag)) => {
                decoded_any = true;
                flag
            }
            Ok(other) => {
                diagnostics.push(format!("{label} cell is not a boolean: {other}"));
                false
            }
            Err(e) => {
                diagnostics.push(format!("could not decode {label} cell '{}': {e}", fields[index]));
                false
            }
        }
    };
    let has_calls = flag_field(2, "has_calls");
    let has_tasks = flag_field(3, "has_tasks");

    if !decoded_any {
        debug!(row = %line, "Pipe-delimited line has no decodable cells");
        return None;
    }

    Some(Candidates::Routed {
        calls,
        tasks,
        has_calls,
        has_tasks,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const TABLE: &str = "\
| calls | tasks | has_calls | has_tasks |
|-------|-------|-----------|-----------|
| [{'name':'Standup'}] | [] | True | False |";

    #[test]
    fn bracketed_lists_concatenate_in_order() {
        let result = extract(r#"[{"a":1}] noise [{"b":2}]"#);
        assert_eq!(result.encoding(), Encoding::BracketedList);
        assert_eq!(
            result.candidates,
            Candidates::Bracketed(vec![json!({"a": 1}), json!({"b": 2})])
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn bracketed_list_spanning_lines() {
        let text = "Here you go:\n[{'name': 'Review',\n  'members': ['Ann']}]\nThanks";
        let result = extract(text);
        assert_eq!(
            result.candidates,
            Candidates::Bracketed(vec![json!({"name": "Review", "members": ["Ann"]})])
        );
    }

    #[test]
    fn bad_bracketed_span_is_skipped_with_diagnostic() {
        let result = extract("[{oops}] and [{'name': 'Sync'}]");
        assert_eq!(
            result.candidates,
            Candidates::Bracketed(vec![json!({"name": "Sync"})])
        );
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].contains("[{oops}]"));
    }

    #[test]
    fn delimited_row_with_header_and_separator() {
        let result = extract(TABLE);
        assert_eq!(result.encoding(), Encoding::DelimitedRow);
        assert_eq!(
            result.candidates,
            Candidates::Routed {
                calls: vec![json!({"name": "Standup"})],
                tasks: vec![],
                has_calls: true,
                has_tasks: false,
            }
        );
    }

    #[test]
    fn delimited_row_without_outer_pipes() {
        let text = "calls | tasks | has_calls | has_tasks\n--- | --- | --- | ---\n[] | [{'text': 'Buy milk'}] | False | True";
        let result = extract(text);
        assert!(!result.has_calls());
        assert!(result.has_tasks());
        assert_eq!(result.candidate_count(), 1);
    }

    #[test]
    fn last_data_row_wins() {
        let text = format!("{TABLE}\n| [{{'name':'Retro'}}] | [] | True | False |");
        let result = extract(&text);
        match result.candidates {
            Candidates::Routed { calls, .. } => assert_eq!(calls, vec![json!({"name": "Retro"})]),
            other => panic!("Expected Routed, got {other:?}"),
        }
    }

    #[test]
    fn bad_cell_becomes_default_with_diagnostic() {
        let text = "| [{'name':'Sync'}] | nope | True | maybe |";
        let result = extract(text);
        assert_eq!(
            result.candidates,
            Candidates::Routed {
                calls: vec![json!({"name": "Sync"})],
                tasks: vec![],
                has_calls: true,
                has_tasks: false,
            }
        );
        assert_eq!(result.diagnostics.len(), 2);
    }

    #[test]
    fn pipes_inside_bracketed_strings_stay_bracketed() {
        let result = extract("Found: [{'name': 'Sync | Ann | Bob | 10:00'}]");
        assert_eq!(
            result.candidates,
            Candidates::Bracketed(vec![json!({"name": "Sync | Ann | Bob | 10:00"})])
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn trailing_pipe_noise_does_not_hide_the_table() {
        let text = format!("{TABLE}\nnotes | from | the | call");
        let result = extract(&text);
        assert_eq!(result.encoding(), Encoding::DelimitedRow);
        assert!(result.has_calls());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn header_only_table_is_unrecognized() {
        let result = extract("| calls | tasks | has_calls | has_tasks |\n|---|---|---|---|");
        assert!(result.is_unrecognized());
    }

    #[test]
    fn separator_line_is_not_a_row() {
        assert!(!is_data_row("|---|:---:|===|+--|"));
        assert!(is_data_row("| [] | [] | True | False |"));
        assert!(!is_data_row("| a | b | c |"));
    }

    #[test]
    fn plain_text_is_unrecognized() {
        let result = extract("Sorry, I could not find any meetings in that message.");
        assert!(result.is_unrecognized());
        assert_eq!(result.candidate_count(), 0);
        assert!(!result.has_calls());
        assert!(!result.has_tasks());
    }

    #[test]
    fn empty_routed_row_is_still_recognized() {
        let result = extract("| [] | [] | False | False |");
        assert_eq!(result.encoding(), Encoding::DelimitedRow);
        assert_eq!(result.candidate_count(), 0);
    }
}
