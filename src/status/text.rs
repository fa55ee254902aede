//! Plain-text progress for chat-style consumers

use std::fmt::Write;

use crate::domain::{TaskStatus, truncate_chars};
use crate::storage::Progress;

/// Longest task description shown per line
const DESCRIPTION_CHARS: usize = 60;

/// Render progress as a short multi-line summary
pub fn render_progress_text(progress: &Progress) -> String {
    let stats = &progress.stats;
    let mut out = format!(
        "Tasks: {} total, {} completed, {} failed, {} pending\n",
        stats.total, stats.completed, stats.failed, stats.pending
    );

    if progress.recent.is_empty() {
        out.push_str("No tasks recorded yet.\n");
        return out;
    }

    out.push_str("Recent:\n");
    for record in &progress.recent {
        let marker = match record.status {
            TaskStatus::Completed => "+",
            TaskStatus::Failed => "x",
            TaskStatus::Pending => "~",
        };
        let _ = write!(
            out,
            "{} [{}] {} ({})",
            marker,
            record.status,
            truncate_chars(&record.description, DESCRIPTION_CHARS),
            record.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(result) = &record.result {
            let _ = write!(out, ": {}", result);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskRecord;
    use crate::storage::TaskStats;

    #[test]
    fn test_render_empty() {
        let text = render_progress_text(&Progress::default());
        assert!(text.starts_with("Tasks: 0 total"));
        assert!(text.contains("No tasks recorded yet."));
    }

    #[test]
    fn test_render_records() {
        let done = TaskRecord::new("g", "request faucet funds")
            .finished(TaskStatus::Completed, "0xabc")
            .unwrap();
        let failed = TaskRecord::new("g", "transfer 5 eth")
            .finished(TaskStatus::Failed, "insufficient balance")
            .unwrap();
        let progress = Progress {
            recent: vec![failed, done],
            stats: TaskStats {
                pending: 0,
                completed: 1,
                failed: 1,
                total: 2,
            },
        };

        let text = render_progress_text(&progress);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Tasks: 2 total, 1 completed, 1 failed, 0 pending");
        assert!(lines[2].starts_with("x [failed] transfer 5 eth"));
        assert!(lines[2].ends_with(": insufficient balance"));
        assert!(lines[3].starts_with("+ [completed] request faucet funds"));
        assert!(lines[3].ends_with(": 0xabc"));
    }
}
