//! Domain types for chainpilot
//!
//! - TaskRecord / TaskStatus: one task attempt and its lifecycle
//! - ServiceError: success/retryable/fatal classification of model calls
//! - LoopExit / LoopReport / NextGoal: explicit loop transitions

pub mod outcome;
pub mod task;

pub use outcome::{LoopExit, LoopReport, LoopStage, NextGoal, ServiceError};
pub use task::{TaskRecord, TaskStatus, truncate_chars};
