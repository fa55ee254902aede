//! Goal planner - decomposes a goal into ordered task descriptions

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::context::ContextEntry;
use crate::config::PlannerMode;
use crate::domain::ServiceError;
use crate::llm::{CompletionRequest, LlmClient, parse_structured};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::{PLANNER, PLANNER_STRUCTURED, PLANNER_SYSTEM};

/// The planning model call failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("planning failed: {0}")]
pub struct PlanningFailure(pub ServiceError);

/// One task as returned in structured mode.
///
/// Only `description` is used downstream; the other fields are informative.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannedTask {
    pub description: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub success_criteria: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StructuredPlan {
    tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub mode: PlannerMode,
    pub min_tasks: usize,
    pub max_tasks: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            mode: PlannerMode::Numbered,
            min_tasks: 3,
            max_tasks: 5,
        }
    }
}

#[derive(Serialize)]
struct PlannerPrompt<'a> {
    goal: &'a str,
    min_tasks: usize,
    max_tasks: usize,
    capabilities: &'a str,
    hints: &'a [ContextEntry],
}

pub struct GoalPlanner {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    catalogue: String,
    settings: PlannerSettings,
}

impl GoalPlanner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        catalogue: impl Into<String>,
        settings: PlannerSettings,
    ) -> Self {
        Self {
            llm,
            renderer,
            catalogue: catalogue.into(),
            settings,
        }
    }

    pub async fn plan(&self, goal: &str) -> Result<Vec<String>, PlanningFailure> {
        self.plan_with_hints(goal, &[]).await
    }

    /// Plan `goal`, showing the model annotations from earlier iterations
    pub async fn plan_with_hints(&self, goal: &str, hints: &[ContextEntry]) -> Result<Vec<String>, PlanningFailure> {
        if goal.trim().is_empty() {
            return Err(PlanningFailure(ServiceError::Fatal("goal is empty".to_string())));
        }

        let template = match self.settings.mode {
            PlannerMode::Numbered => PLANNER,
            PlannerMode::Structured => PLANNER_STRUCTURED,
        };
        let prompt = self
            .renderer
            .render_named(
                template,
                &PlannerPrompt {
                    goal,
                    min_tasks: self.settings.min_tasks,
                    max_tasks: self.settings.max_tasks,
                    capabilities: &self.catalogue,
                    hints,
                },
            )
            .map_err(|e| PlanningFailure(ServiceError::Fatal(e.to_string())))?;

        let mut request = CompletionRequest::new(PLANNER_SYSTEM).with_user_message(prompt);
        if self.settings.mode == PlannerMode::Structured {
            request = request.with_json_mode();
        }

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| PlanningFailure(e.into()))?;

        let mut tasks = match self.settings.mode {
            PlannerMode::Numbered => parse_numbered(&response.content),
            PlannerMode::Structured => parse_structured_plan(&response.content)
                .map_err(|e| PlanningFailure(e.into()))?
                .into_iter()
                .map(|t| t.description.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        };

        if tasks.is_empty() {
            return Err(PlanningFailure(ServiceError::retryable("planner returned no tasks")));
        }
        if tasks.len() > self.settings.max_tasks {
            warn!(
                "Planner returned {} tasks, keeping the first {}",
                tasks.len(),
                self.settings.max_tasks
            );
            tasks.truncate(self.settings.max_tasks);
        }
        if tasks.len() < self.settings.min_tasks {
            debug!("Planner returned only {} tasks", tasks.len());
        }

        debug!("Planned {} tasks for goal: {}", tasks.len(), goal);
        Ok(tasks)
    }
}

/// Split a numbered or bulleted list into task descriptions
pub fn parse_numbered(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
        return line;
    }

    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim();
        }
    }
    line
}

/// Decode a structured plan
pub fn parse_structured_plan(text: &str) -> Result<Vec<PlannedTask>, crate::llm::LlmError> {
    parse_structured::<StructuredPlan>(text).map(|p| p.tasks)
}
