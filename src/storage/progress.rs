//! Read-only progress view over the task store

use serde::{Deserialize, Serialize};

use crate::domain::{TaskRecord, TaskStatus};
use crate::error::Result;

/// Record counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

impl TaskStats {
    pub fn count(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
        }
    }

    pub(crate) fn add(&mut self, status: TaskStatus, n: u64) {
        match status {
            TaskStatus::Pending => self.pending += n,
            TaskStatus::Completed => self.completed += n,
            TaskStatus::Failed => self.failed += n,
        }
        self.total += n;
    }
}

/// Most recent records plus overall counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Most-recent-first
    pub recent: Vec<TaskRecord>,
    pub stats: TaskStats,
}

/// The only surface status consumers get
pub trait ProgressReader: Send + Sync {
    fn progress(&self, limit: usize) -> Result<Progress>;

    fn task(&self, id: &str) -> Result<Option<TaskRecord>>;

    fn task_stats(&self) -> Result<TaskStats>;
}
