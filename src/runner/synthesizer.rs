//! Goal synthesizer - turns one iteration's results into the next goal

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::context::AccumulatedContext;
use crate::domain::{NextGoal, ServiceError, truncate_chars};
use crate::llm::{CompletionRequest, LlmClient, extract_json_object};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::{SYNTHESIZER, SYNTHESIZER_SYSTEM};

/// The synthesis model call failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("synthesis failed: {0}")]
pub struct SynthesisFailure(pub ServiceError);

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Decision {
    Continue {
        #[serde(default)]
        goal: String,
    },
    Complete {
        #[serde(default)]
        reason: String,
    },
}

#[derive(Serialize)]
struct SynthesizerPrompt<'a> {
    previous_goal: &'a str,
    results: &'a [String],
    context: String,
    capabilities: &'a str,
    goal_max_chars: usize,
}

pub struct GoalSynthesizer {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    catalogue: String,
    goal_max_chars: usize,
}

impl GoalSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        catalogue: impl Into<String>,
        goal_max_chars: usize,
    ) -> Self {
        Self {
            llm,
            renderer,
            catalogue: catalogue.into(),
            goal_max_chars: goal_max_chars.max(1),
        }
    }

    /// Ask the model for the goal of the next iteration
    pub async fn next(
        &self,
        previous_goal: &str,
        results: &[String],
        context: &AccumulatedContext,
    ) -> Result<NextGoal, SynthesisFailure> {
        let prompt = self
            .renderer
            .render_named(
                SYNTHESIZER,
                &SynthesizerPrompt {
                    previous_goal,
                    results,
                    context: context.render(),
                    capabilities: &self.catalogue,
                    goal_max_chars: self.goal_max_chars,
                },
            )
            .map_err(|e| SynthesisFailure(ServiceError::Fatal(e.to_string())))?;

        let request = CompletionRequest::new(SYNTHESIZER_SYSTEM)
            .with_user_message(prompt)
            .with_json_mode();
        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| SynthesisFailure(e.into()))?;

        let next = interpret(&response.content, previous_goal, self.goal_max_chars);
        match &next {
            NextGoal::Continue(goal) => info!("Next goal: {}", goal),
            NextGoal::Satisfied(reason) => info!("Goal satisfied: {}", reason),
        }
        Ok(next)
    }
}

/// Read the synthesizer reply.
///
/// A JSON decision is preferred; a reply with no JSON object is taken as the
/// goal text. An unrecognised object or an empty goal keeps `previous_goal`.
pub fn interpret(text: &str, previous_goal: &str, goal_max_chars: usize) -> NextGoal {
    let goal = match extract_json_object(text) {
        None => {
            debug!("Synthesizer reply has no decision object, using it as the goal");
            text.to_string()
        }
        Some(json) => match serde_json::from_str::<Decision>(json) {
            Ok(Decision::Complete { reason }) => {
                let reason = reason.trim();
                let reason = if reason.is_empty() { "objective met" } else { reason };
                return NextGoal::Satisfied(reason.to_string());
            }
            Ok(Decision::Continue { goal }) => goal,
            Err(e) => {
                warn!("Unrecognised synthesizer decision, keeping the goal: {}", e);
                String::new()
            }
        },
    };

    let goal = goal.trim();
    if goal.is_empty() {
        return NextGoal::Continue(previous_goal.to_string());
    }
    NextGoal::Continue(truncate_chars(goal, goal_max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, LlmError, MockLlmClient};

    fn synthesizer(mock: Arc<MockLlmClient>) -> GoalSynthesizer {
        GoalSynthesizer::new(
            mock,
            Arc::new(PromptRenderer::new().unwrap()),
            "- deployNFT: deploy",
            20,
        )
    }

    #[test]
    fn test_interpret_continue() {
        assert_eq!(
            interpret(r#"{"status": "continue", "goal": "mint an NFT"}"#, "prev", 100),
            NextGoal::Continue("mint an NFT".to_string())
        );
    }

    #[test]
    fn test_interpret_complete() {
        assert_eq!(
            interpret(r#"{"status": "complete", "reason": "NFT deployed"}"#, "prev", 100),
            NextGoal::Satisfied("NFT deployed".to_string())
        );
    }

    #[test]
    fn test_interpret_plain_text_and_fences() {
        assert_eq!(
            interpret("Deploy a token", "prev", 100),
            NextGoal::Continue("Deploy a token".to_string())
        );
        assert_eq!(
            interpret("```json\n{\"status\":\"continue\",\"goal\":\"trade\"}\n```", "prev", 100),
            NextGoal::Continue("trade".to_string())
        );
    }

    #[test]
    fn test_interpret_empty_keeps_previous_goal() {
        assert_eq!(interpret("   ", "prev", 100), NextGoal::Continue("prev".to_string()));
        assert_eq!(
            interpret(r#"{"status": "continue", "goal": ""}"#, "prev", 100),
            NextGoal::Continue("prev".to_string())
        );
    }

    #[test]
    fn test_interpret_unknown_status_keeps_previous_goal() {
        assert_eq!(
            interpret(r#"{"status": "done"}"#, "prev", 100),
            NextGoal::Continue("prev".to_string())
        );
        assert_eq!(
            interpret(r#"Decision: {"goal": "mint"}"#, "prev", 100),
            NextGoal::Continue("prev".to_string())
        );
    }

    #[test]
    fn test_interpret_truncates_goal() {
        let NextGoal::Continue(goal) = interpret(&"g".repeat(50), "prev", 10) else {
            panic!("expected continue");
        };
        assert_eq!(goal.chars().count(), 10);
    }

    #[tokio::test]
    async fn test_next_sends_results_and_context() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(
            r#"{"status": "continue", "goal": "mint the NFT"}"#,
        )]));
        let mut context = AccumulatedContext::new(5);
        context.record_result("task-1", "0xabc");

        let next = synthesizer(mock.clone())
            .next("deploy NFT", &["NFT deployed".to_string()], &context)
            .await
            .unwrap();
        assert_eq!(next, NextGoal::Continue("mint the NFT".to_string()));

        let request = &mock.requests()[0];
        assert!(request.json_mode);
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("Previous goal: deploy NFT"));
        assert!(prompt.contains("- NFT deployed"));
        assert!(prompt.contains("0xabc"));
        assert!(prompt.contains("at most 20 characters"));
    }

    #[tokio::test]
    async fn test_next_without_results() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("try again")]));
        synthesizer(mock.clone())
            .next("g", &[], &AccumulatedContext::new(5))
            .await
            .unwrap();
        assert!(mock.requests()[0].messages[0].content.contains("(no task produced a result)"));
    }

    #[tokio::test]
    async fn test_next_classifies_errors() {
        let mock = Arc::new(MockLlmClient::with_results(vec![Err(LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        })]));
        let err = synthesizer(mock)
            .next("g", &[], &AccumulatedContext::new(5))
            .await
            .unwrap_err();
        assert!(err.0.is_retryable());
    }
}
