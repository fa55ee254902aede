//! Storage - durable task records and the read-only progress view

pub mod progress;
pub mod task_store;

pub use progress::{Progress, ProgressReader, TaskStats};
pub use task_store::TaskStore;
