//! Record data model: calls, tasks, and their enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event topic a record is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "new-call")]
    NewCall,
    #[serde(rename = "new-task")]
    NewTask,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewCall => "new-call",
            Self::NewTask => "new-task",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled call or meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Call title. Never empty.
    pub name: String,
    /// Participants, in the order given upstream.
    #[serde(default)]
    pub members: Vec<String>,
    /// Opaque date token; empty when unknown.
    #[serde(default)]
    pub date: String,
    /// Opaque time token; empty when unknown.
    #[serde(default)]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Case-insensitive parse; anything unrecognized becomes `Medium`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Task lifecycle status. New tasks always start as `Todo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
}

/// A to-do item extracted from the utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Assigned by the pipeline at emission time.
    pub id: u64,
    pub text: String,
    pub status: TaskStatus,
    pub priority: Priority,
}

impl TaskRecord {
    /// Create a new task in the initial `todo` state.
    pub fn new(id: u64, text: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            text: text.into(),
            status: TaskStatus::Todo,
            priority,
        }
    }
}
