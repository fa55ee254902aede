//! Error types for chainpilot
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::capabilities::CapabilityError;
use crate::domain::TaskStatus;
use crate::llm::LlmError;

/// All error types that can occur in chainpilot
#[derive(Debug, Error)]
pub enum AgentError {
    /// Task record not found in the store
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A terminal task was asked to transition again
    #[error("Invalid transition for task {id}: already {from}")]
    InvalidTransition { id: String, from: TaskStatus },

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Language-model error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Capability execution or validation error
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Prompt template error
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite index error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type alias for chainpilot operations
pub type Result<T> = std::result::Result<T, AgentError>;
