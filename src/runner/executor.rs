//! Task executor - runs one task through the model and the capability registry.
//!
//! A pending record is created before the model is called. The model may
//! request capabilities but must answer in text within a bounded number of
//! model calls. Any model, validation or capability error fails the record;
//! only storage errors escape.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::context::AccumulatedContext;
use crate::capabilities::{CapabilityError, CapabilityRegistry};
use crate::domain::truncate_chars;
use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, ToolResult, needs_tool_execution};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::EXECUTOR;
use crate::storage::TaskStore;

/// Why a single task attempt failed
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("{source}")]
    Capability {
        name: String,
        #[source]
        source: CapabilityError,
    },

    #[error("no final answer after {0} model steps")]
    StepLimit(usize),

    #[error("model returned an empty answer")]
    EmptyAnswer,

    #[error("prompt error: {0}")]
    Prompt(String),
}

impl ExecutionFailure {
    /// Stand-in for a failure whose message is empty
    fn summary(&self) -> String {
        match self {
            Self::Llm(_) => "model call failed".to_string(),
            Self::Capability { name, .. } => format!("capability {} failed", name),
            Self::StepLimit(steps) => format!("no final answer after {} model steps", steps),
            Self::EmptyAnswer => "model returned an empty answer".to_string(),
            Self::Prompt(_) => "prompt error".to_string(),
        }
    }

    /// Non-empty record text of at most `max_chars` characters
    fn record_text(&self, max_chars: usize) -> String {
        let max_chars = max_chars.max(1);
        let message = truncate_chars(self.to_string().trim(), max_chars);
        if message.is_empty() {
            truncate_chars(&self.summary(), max_chars)
        } else {
            message
        }
    }
}

/// Result of one `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: String,
    /// Truncated answer; `None` when the task failed
    pub result: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub system_prompt: String,
    /// Model calls allowed per task, the final answer included
    pub max_tool_steps: usize,
    pub result_max_chars: usize,
    pub error_max_chars: usize,
    pub max_tokens: Option<u32>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_tool_steps: 5,
            result_max_chars: 200,
            error_max_chars: 200,
            max_tokens: None,
        }
    }
}

#[derive(Serialize)]
struct ExecutorPrompt<'a> {
    task: &'a str,
    goal: &'a str,
    context: String,
}

pub struct TaskExecutor {
    llm: Arc<dyn LlmClient>,
    registry: Arc<CapabilityRegistry>,
    store: Arc<TaskStore>,
    renderer: Arc<PromptRenderer>,
    settings: ExecutorSettings,
}

impl TaskExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<CapabilityRegistry>,
        store: Arc<TaskStore>,
        renderer: Arc<PromptRenderer>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            llm,
            registry,
            store,
            renderer,
            settings,
        }
    }

    /// Execute `task` and record its outcome
    pub async fn execute(&self, task: &str, goal: &str, context: &AccumulatedContext) -> Result<TaskOutcome> {
        let record = self.store.create(goal, task)?;
        info!("Executing task {}: {}", record.id, task);

        match self.attempt(task, goal, context).await {
            Ok(answer) => {
                let result = truncate_chars(&answer, self.settings.result_max_chars.max(1));
                self.store.complete(&record.id, &result)?;
                info!("Task {} completed", record.id);
                Ok(TaskOutcome {
                    task_id: record.id,
                    result: Some(result),
                })
            }
            Err(failure) => {
                let message = failure.record_text(self.settings.error_max_chars);
                self.store.fail(&record.id, &message)?;
                warn!("Task {} failed: {}", record.id, message);
                Ok(TaskOutcome {
                    task_id: record.id,
                    result: None,
                })
            }
        }
    }

    async fn attempt(
        &self,
        task: &str,
        goal: &str,
        context: &AccumulatedContext,
    ) -> std::result::Result<String, ExecutionFailure> {
        let prompt = self
            .renderer
            .render_named(
                EXECUTOR,
                &ExecutorPrompt {
                    task,
                    goal,
                    context: context.render(),
                },
            )
            .map_err(|e| ExecutionFailure::Prompt(e.to_string()))?;

        let mut messages = vec![Message::user(prompt)];
        let mut last_tool_output: Option<String> = None;

        let max_steps = self.settings.max_tool_steps.max(1);
        for step in 1..=max_steps {
            let mut request = CompletionRequest::new(self.settings.system_prompt.clone())
                .with_tools(self.registry.definitions().to_vec());
            request.messages = messages.clone();
            if let Some(max_tokens) = self.settings.max_tokens {
                request = request.with_max_tokens(max_tokens);
            }

            let response = self.llm.complete(request).await?;

            if !needs_tool_execution(&response) || response.tool_calls.is_empty() {
                let answer = response.content.trim();
                if !answer.is_empty() {
                    return Ok(answer.to_string());
                }
                return last_tool_output.ok_or(ExecutionFailure::EmptyAnswer);
            }

            if step == max_steps {
                return Err(ExecutionFailure::StepLimit(max_steps));
            }

            messages.push(Message::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                debug!("Step {}: model requested {}", step, call.name);
                let output = self
                    .registry
                    .dispatch(call)
                    .await
                    .map_err(|source| ExecutionFailure::Capability {
                        name: call.name.clone(),
                        source,
                    })?;
                messages.push(Message::tool_result(&ToolResult::success(&call.id, &output)));
                last_tool_output = Some(output);
            }
        }

        Err(ExecutionFailure::StepLimit(max_steps))
    }
}
