//! Loop outcome types.
//!
//! Results of external-service calls and the explicit exit states of the
//! agent loop.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::llm::LlmError;

/// Classified failure of an external-service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Worth trying again, optionally not before `retry_after`
    #[error("retryable: {message}")]
    Retryable {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Retrying will not help
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn retryable(message: impl Into<String>) -> Self {
        ServiceError::Retryable {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Retryable { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::Retryable { message, .. } => message,
            ServiceError::Fatal(message) => message,
        }
    }
}

impl From<LlmError> for ServiceError {
    fn from(err: LlmError) -> Self {
        let retry_after = match &err {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        if err.is_retryable() {
            ServiceError::Retryable {
                message: err.to_string(),
                retry_after,
            }
        } else {
            ServiceError::Fatal(err.to_string())
        }
    }
}

/// Stage of an iteration, used to attribute fatal exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStage {
    Planning,
    Execution,
    Synthesis,
}

impl fmt::Display for LoopStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopStage::Planning => "planning",
            LoopStage::Execution => "execution",
            LoopStage::Synthesis => "synthesis",
        };
        f.write_str(s)
    }
}

/// What the synthesizer decided after an iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextGoal {
    /// Keep going with this goal
    Continue(String),
    /// The objective is met; the loop may stop
    Satisfied(String),
}

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopExit {
    /// Synthesizer reported the goal as satisfied
    GoalSatisfied { reason: String },
    /// Configured iteration ceiling reached
    MaxIterations { iterations: u64 },
    /// Unrecoverable error in a stage
    Fatal { stage: LoopStage, message: String },
    /// Shutdown was requested
    Shutdown,
}

/// Summary returned when the loop stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopReport {
    pub exit: LoopExit,
    /// Number of iterations that ran to the synthesis step
    pub iterations: u64,
    /// Goal in effect when the loop stopped
    pub final_goal: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_from_rate_limit_keeps_retry_after() {
        let err: ServiceError = LlmError::RateLimited {
            retry_after: Duration::from_secs(7),
        }
        .into();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            ServiceError::Retryable {
                retry_after: Some(d),
                ..
            } if d == Duration::from_secs(7)
        ));
    }

    #[test]
    fn test_service_error_from_client_error_is_fatal() {
        let err: ServiceError = LlmError::ApiError {
            status: 401,
            message: "bad key".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
        assert!(err.message().contains("bad key"));
    }

    #[test]
    fn test_service_error_from_server_error_is_retryable() {
        let err: ServiceError = LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_loop_stage_display() {
        assert_eq!(LoopStage::Planning.to_string(), "planning");
        assert_eq!(LoopStage::Synthesis.to_string(), "synthesis");
    }

    #[test]
    fn test_loop_exit_serialization() {
        let exit = LoopExit::Fatal {
            stage: LoopStage::Planning,
            message: "missing key".to_string(),
        };
        let json = serde_json::to_value(&exit).unwrap();
        assert_eq!(json["kind"], "fatal");
        assert_eq!(json["stage"], "planning");

        let json = serde_json::to_value(LoopExit::Shutdown).unwrap();
        assert_eq!(json["kind"], "shutdown");
    }
}
