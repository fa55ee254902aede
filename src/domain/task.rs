//! Task record and lifecycle status
//!
//! A TaskRecord is one attempt at one planner-produced task. It is created
//! `pending` before execution starts and transitions exactly once to
//! `completed` or `failed`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::generate_task_id;

/// One executed task attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    /// Unique identifier ("task-1738300800123-a1b2c3d4")
    pub id: String,

    /// Goal that was active when the task was planned
    pub goal: String,

    /// Atomic task text produced by the planner
    pub description: String,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Output on completion, error summary on failure
    pub result: Option<String>,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Status of a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Failed];

    /// Returns true if the status can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(self, TaskStatus::Pending) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TaskRecord {
    /// Create a new pending record
    pub fn new(goal: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: generate_task_id(),
            goal: goal.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            timestamp: Utc::now(),
        }
    }

    /// Return a copy moved to a terminal status.
    ///
    /// Returns None when the record is not pending or `status` is not terminal.
    pub fn finished(&self, status: TaskStatus, result: impl Into<String>) -> Option<Self> {
        if !self.status.can_transition_to(status) {
            return None;
        }
        let mut next = self.clone();
        next.status = status;
        next.result = Some(result.into());
        Some(next)
    }
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
