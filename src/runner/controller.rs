//! Loop controller - drives plan -> execute -> synthesize until an exit.
//!
//! The controller owns the accumulated context and the current goal. Tasks
//! run strictly in order, one at a time. Planning and synthesis calls are
//! retried on retryable errors; every other way out of the loop is an
//! explicit `LoopExit`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use super::backoff::{IterationDelay, RetryPolicy};
use super::context::{AccumulatedContext, ITERATION, LAST_COMPLETED_TASK, LAST_GOAL};
use super::executor::{ExecutorSettings, TaskExecutor};
use super::planner::{GoalPlanner, PlannerSettings};
use super::synthesizer::GoalSynthesizer;
use crate::capabilities::CapabilityRegistry;
use crate::config::Config;
use crate::domain::{LoopExit, LoopReport, LoopStage, NextGoal, ServiceError};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::prompt::PromptRenderer;
use crate::storage::TaskStore;

/// Loop-level knobs
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub initial_goal: String,
    /// Stop after this many iterations; `None` runs until another exit
    pub max_iterations: Option<u64>,
    pub context_max_entries: usize,
    pub delay: IterationDelay,
    pub retry: RetryPolicy,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_goal: config.agent.initial_goal.clone(),
            max_iterations: config.agent.max_iterations,
            context_max_entries: config.limits.context_max_entries,
            delay: IterationDelay::from_config(&config.pacing),
            retry: RetryPolicy::from_config(&config.pacing),
        }
    }
}

/// Read-only view of the loop, published after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopSnapshot {
    pub goal: String,
    pub iteration: u64,
    pub context: Value,
    pub running: bool,
    pub exit: Option<LoopExit>,
}

impl LoopSnapshot {
    /// Snapshot of a loop that has not started
    pub fn idle(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            iteration: 0,
            context: Value::Object(Default::default()),
            running: false,
            exit: None,
        }
    }
}

/// Result of a model call that may have been retried
enum Attempt<T> {
    Done(T),
    Failed(ServiceError),
    Shutdown,
}

pub struct LoopController {
    planner: GoalPlanner,
    executor: TaskExecutor,
    synthesizer: GoalSynthesizer,
    settings: LoopSettings,
    context: AccumulatedContext,
    shutdown: watch::Receiver<bool>,
    snapshot: watch::Sender<LoopSnapshot>,
}

impl LoopController {
    pub fn new(
        planner: GoalPlanner,
        executor: TaskExecutor,
        synthesizer: GoalSynthesizer,
        settings: LoopSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (snapshot, _) = watch::channel(LoopSnapshot::idle(settings.initial_goal.clone()));
        Self {
            planner,
            executor,
            synthesizer,
            context: AccumulatedContext::new(settings.context_max_entries),
            settings,
            shutdown,
            snapshot,
        }
    }

    /// Wire planner, executor and synthesizer from configuration
    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        registry: Arc<CapabilityRegistry>,
        store: Arc<TaskStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let renderer = Arc::new(PromptRenderer::new()?);
        let catalogue = registry.catalogue_text();

        let planner = GoalPlanner::new(
            llm.clone(),
            renderer.clone(),
            catalogue.clone(),
            PlannerSettings {
                mode: config.agent.planner_mode,
                min_tasks: config.agent.min_tasks,
                max_tasks: config.agent.max_tasks,
            },
        );
        let executor = TaskExecutor::new(
            llm.clone(),
            registry,
            store,
            renderer.clone(),
            ExecutorSettings {
                system_prompt: config.agent.system_prompt.clone(),
                max_tool_steps: config.agent.max_tool_steps,
                result_max_chars: config.limits.result_max_chars,
                error_max_chars: config.limits.error_max_chars,
                max_tokens: Some(config.llm.max_tokens),
            },
        );
        let synthesizer = GoalSynthesizer::new(llm, renderer, catalogue, config.limits.goal_max_chars);

        Ok(Self::new(
            planner,
            executor,
            synthesizer,
            LoopSettings::from_config(config),
            shutdown,
        ))
    }

    /// Receiver for loop snapshots
    pub fn subscribe(&self) -> watch::Receiver<LoopSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn context(&self) -> &AccumulatedContext {
        &self.context
    }

    /// Run until the loop exits
    pub async fn run(&mut self) -> LoopReport {
        let mut goal = self.settings.initial_goal.clone();
        let mut iterations: u64 = 0;
        info!("Starting agent loop with goal: {}", goal);
        self.publish(&goal, iterations, None);

        let exit = 'iterate: loop {
            if self.shutdown_requested() {
                break LoopExit::Shutdown;
            }
            if self.settings.max_iterations.is_some_and(|max| iterations >= max) {
                break LoopExit::MaxIterations { iterations };
            }

            // Plan
            let tasks = {
                let planner = &self.planner;
                let hints = self.context.hints();
                let hints = hints.as_slice();
                let current: &str = &goal;
                let attempt = call_with_retries(LoopStage::Planning, self.settings.retry, &mut self.shutdown, move || async move {
                    planner.plan_with_hints(current, hints).await.map_err(|f| f.0)
                })
                .await;
                match attempt {
                    Attempt::Done(tasks) => tasks,
                    Attempt::Failed(err) => {
                        error!("Planning failed: {}", err);
                        break LoopExit::Fatal {
                            stage: LoopStage::Planning,
                            message: err.message().to_string(),
                        };
                    }
                    Attempt::Shutdown => break LoopExit::Shutdown,
                }
            };
            info!("Iteration {}: {} tasks for goal: {}", iterations + 1, tasks.len(), goal);

            // Execute, strictly in order
            let mut results = Vec::new();
            for task in &tasks {
                if self.shutdown_requested() {
                    break 'iterate LoopExit::Shutdown;
                }
                match self.executor.execute(task, &goal, &self.context).await {
                    Ok(outcome) => {
                        if let Some(result) = outcome.result {
                            self.context.record_result(&outcome.task_id, &result);
                            self.context.annotate(LAST_COMPLETED_TASK, task.as_str());
                            results.push(result);
                        }
                    }
                    Err(err) => {
                        error!("Task store failure: {}", err);
                        break 'iterate LoopExit::Fatal {
                            stage: LoopStage::Execution,
                            message: err.to_string(),
                        };
                    }
                }
                self.publish(&goal, iterations, None);
            }
            debug!(
                "Context holds {}/{} results ({} evicted)",
                self.context.len(),
                self.context.max_entries(),
                self.context.evicted()
            );

            // Synthesize
            let next = {
                let synthesizer = &self.synthesizer;
                let context = &self.context;
                let current: &str = &goal;
                let results = results.as_slice();
                let attempt = call_with_retries(LoopStage::Synthesis, self.settings.retry, &mut self.shutdown, move || async move {
                    synthesizer.next(current, results, context).await.map_err(|f| f.0)
                })
                .await;
                match attempt {
                    Attempt::Done(next) => next,
                    Attempt::Failed(err) if err.is_retryable() => {
                        warn!("Synthesis retries exhausted, keeping goal: {}", err);
                        NextGoal::Continue(goal.clone())
                    }
                    Attempt::Failed(err) => {
                        error!("Synthesis failed: {}", err);
                        break LoopExit::Fatal {
                            stage: LoopStage::Synthesis,
                            message: err.message().to_string(),
                        };
                    }
                    Attempt::Shutdown => break LoopExit::Shutdown,
                }
            };

            iterations += 1;
            self.context.annotate(ITERATION, iterations.to_string());
            self.context.annotate(LAST_GOAL, goal.as_str());

            match next {
                NextGoal::Satisfied(reason) => {
                    self.publish(&goal, iterations, None);
                    break LoopExit::GoalSatisfied { reason };
                }
                NextGoal::Continue(next_goal) => goal = next_goal,
            }
            self.publish(&goal, iterations, None);

            if self.settings.max_iterations.is_some_and(|max| iterations >= max) {
                break LoopExit::MaxIterations { iterations };
            }

            let delay = self.settings.delay.delay_for(iterations);
            if sleep_or_shutdown(&mut self.shutdown, delay).await {
                break LoopExit::Shutdown;
            }
        };

        info!("Agent loop stopped after {} iterations: {:?}", iterations, exit);
        self.publish(&goal, iterations, Some(exit.clone()));

        LoopReport {
            exit,
            iterations,
            final_goal: goal,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn publish(&self, goal: &str, iteration: u64, exit: Option<LoopExit>) {
        self.snapshot.send_replace(LoopSnapshot {
            goal: goal.to_string(),
            iteration,
            context: self.context.to_json(),
            running: exit.is_none(),
            exit,
        });
    }
}

/// Call `op` until it succeeds, fails fatally or runs out of retries
async fn call_with_retries<T, F, Fut>(
    stage: LoopStage,
    policy: RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    mut op: F,
) -> Attempt<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Attempt::Done(value),
            Err(ServiceError::Retryable { message, retry_after }) if attempt < policy.max_retries => {
                let wait = policy.backoff(attempt, retry_after);
                warn!(
                    "{} call failed ({}), retry {}/{} in {:?}",
                    stage,
                    message,
                    attempt + 1,
                    policy.max_retries,
                    wait
                );
                attempt += 1;
                if sleep_or_shutdown(shutdown, wait).await {
                    return Attempt::Shutdown;
                }
            }
            Err(err) => return Attempt::Failed(err),
        }
    }
}

/// Sleep for `duration`; returns true if shutdown was requested first
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    if duration.is_zero() {
        return false;
    }

    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => match changed {
                Ok(()) => {
                    if *shutdown.borrow_and_update() {
                        return true;
                    }
                }
                // Sender gone: nobody can ask for shutdown any more
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityContext, SimulatedWallet};
    use crate::domain::TaskStatus;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmError, MockLlmClient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Harness {
        controller: LoopController,
        store: Arc<TaskStore>,
        mock: Arc<MockLlmClient>,
        shutdown: watch::Sender<bool>,
        _temp: TempDir,
    }

    fn settings(max_iterations: Option<u64>, retries: u32) -> LoopSettings {
        LoopSettings {
            initial_goal: "deploy an NFT".to_string(),
            max_iterations,
            context_max_entries: 10,
            delay: IterationDelay::none(),
            retry: RetryPolicy::new(retries, Duration::ZERO, Duration::ZERO),
        }
    }

    fn harness_with(llm: Arc<dyn LlmClient>, mock: Arc<MockLlmClient>, settings: LoopSettings) -> Harness {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(TaskStore::open(temp.path()).unwrap());
        let registry = Arc::new(CapabilityRegistry::new(CapabilityContext {
            wallet: Arc::new(SimulatedWallet::new("base-sepolia")),
            social: None,
        }));
        let renderer = Arc::new(PromptRenderer::new().unwrap());
        let catalogue = registry.catalogue_text();
        let planner = GoalPlanner::new(
            llm.clone(),
            renderer.clone(),
            catalogue.clone(),
            PlannerSettings {
                min_tasks: 1,
                ..Default::default()
            },
        );
        let executor = TaskExecutor::new(
            llm.clone(),
            registry,
            store.clone(),
            renderer.clone(),
            ExecutorSettings::default(),
        );
        let synthesizer = GoalSynthesizer::new(llm, renderer, catalogue, 100);
        let (tx, rx) = watch::channel(false);
        Harness {
            controller: LoopController::new(planner, executor, synthesizer, settings, rx),
            store,
            mock,
            shutdown: tx,
            _temp: temp,
        }
    }

    fn harness(script: Vec<std::result::Result<CompletionResponse, LlmError>>, settings: LoopSettings) -> Harness {
        let mock = Arc::new(MockLlmClient::with_results(script));
        harness_with(mock.clone(), mock, settings)
    }

    fn text(s: &str) -> std::result::Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse::text(s))
    }

    fn unavailable() -> std::result::Result<CompletionResponse, LlmError> {
        Err(LlmError::ApiError {
            status: 503,
            message: "unavailable".to_string(),
        })
    }

    #[tokio::test]
    async fn test_one_iteration_then_max_iterations() {
        let mut h = harness(
            vec![
                text("1. check wallet details"),
                text("wallet is on base-sepolia"),
                text(r#"{"status": "continue", "goal": "request faucet funds"}"#),
            ],
            settings(Some(1), 0),
        );
        let report = h.controller.run().await;

        assert_eq!(report.exit, LoopExit::MaxIterations { iterations: 1 });
        assert_eq!(report.iterations, 1);
        assert_eq!(report.final_goal, "request faucet funds");

        let context = h.controller.context();
        assert_eq!(context.len(), 1);
        assert_eq!(context.annotation(LAST_COMPLETED_TASK), Some("check wallet details"));
        assert_eq!(context.annotation(ITERATION), Some("1"));
        assert_eq!(context.annotation(LAST_GOAL), Some("deploy an NFT"));
        assert_eq!(h.store.stats().unwrap().completed, 1);
    }

    #[tokio::test]
    async fn test_goal_satisfied_exit() {
        let mut h = harness(
            vec![
                text("1. deploy the NFT"),
                text("deployed"),
                text(r#"{"status": "complete", "reason": "NFT is live"}"#),
            ],
            settings(None, 0),
        );
        let report = h.controller.run().await;
        assert_eq!(
            report.exit,
            LoopExit::GoalSatisfied {
                reason: "NFT is live".to_string()
            }
        );
        assert_eq!(report.iterations, 1);
        assert_eq!(report.final_goal, "deploy an NFT");
    }

    #[tokio::test]
    async fn test_failed_task_is_excluded_and_iteration_continues() {
        let mut h = harness(
            vec![
                text("1. first\n2. second"),
                Err(LlmError::ApiError {
                    status: 400,
                    message: "bad request".to_string(),
                }),
                text("second done"),
                text(r#"{"status": "continue", "goal": "next"}"#),
            ],
            settings(Some(1), 0),
        );
        h.controller.run().await;

        let stats = h.store.stats().unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(h.controller.context().len(), 1);

        let synth_prompt = &h.mock.requests()[3].messages[0].content;
        assert!(synth_prompt.contains("- second done"));
        assert!(!synth_prompt.contains("bad request"));
    }

    #[tokio::test]
    async fn test_planning_fatal_error_exits() {
        let mut h = harness(
            vec![Err(LlmError::ApiError {
                status: 401,
                message: "invalid key".to_string(),
            })],
            settings(None, 3),
        );
        let report = h.controller.run().await;
        assert!(matches!(
            report.exit,
            LoopExit::Fatal {
                stage: LoopStage::Planning,
                ref message
            } if message.contains("invalid key")
        ));
        assert_eq!(report.iterations, 0);
        assert_eq!(h.mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_planning_retries_then_succeeds() {
        let mut h = harness(
            vec![
                unavailable(),
                text("1. check balance"),
                text("balance is 0"),
                text("check balance again"),
            ],
            settings(Some(1), 2),
        );
        let report = h.controller.run().await;
        assert_eq!(report.exit, LoopExit::MaxIterations { iterations: 1 });
        assert_eq!(report.final_goal, "check balance again");
        assert_eq!(h.mock.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_planning_retries_exhausted_is_fatal() {
        let mut h = harness(vec![unavailable(), unavailable()], settings(None, 1));
        let report = h.controller.run().await;
        assert!(matches!(
            report.exit,
            LoopExit::Fatal {
                stage: LoopStage::Planning,
                ..
            }
        ));
        assert_eq!(h.mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_synthesis_retries_exhausted_keeps_goal() {
        let mut h = harness(
            vec![text("1. check balance"), text("balance is 0"), unavailable()],
            settings(Some(1), 0),
        );
        let report = h.controller.run().await;
        assert_eq!(report.exit, LoopExit::MaxIterations { iterations: 1 });
        assert_eq!(report.final_goal, "deploy an NFT");
    }

    #[tokio::test]
    async fn test_synthesis_fatal_error_exits() {
        let mut h = harness(
            vec![
                text("1. check balance"),
                text("balance is 0"),
                Err(LlmError::InvalidResponse("no choices".to_string())),
            ],
            settings(None, 3),
        );
        let report = h.controller.run().await;
        assert!(matches!(
            report.exit,
            LoopExit::Fatal {
                stage: LoopStage::Synthesis,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let mut h = harness(vec![], settings(None, 0));
        h.shutdown.send(true).unwrap();
        let report = h.controller.run().await;
        assert_eq!(report.exit, LoopExit::Shutdown);
        assert!(h.mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_zero_max_iterations_does_nothing() {
        let mut h = harness(vec![], settings(Some(0), 0));
        let report = h.controller.run().await;
        assert_eq!(report.exit, LoopExit::MaxIterations { iterations: 0 });
        assert!(h.mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_final_state() {
        let mut h = harness(
            vec![
                text("1. check wallet details"),
                text("ok"),
                text(r#"{"status": "continue", "goal": "mint"}"#),
            ],
            settings(Some(1), 0),
        );
        let snapshots = h.controller.subscribe();
        assert!(!snapshots.borrow().running);

        h.controller.run().await;
        let last = snapshots.borrow().clone();
        assert_eq!(last.goal, "mint");
        assert_eq!(last.iteration, 1);
        assert!(!last.running);
        assert_eq!(last.exit, Some(LoopExit::MaxIterations { iterations: 1 }));
        assert_eq!(last.context[ITERATION], "1");
    }

    /// Requests shutdown once `after` model calls have been made
    struct ShutdownAfter {
        inner: Arc<MockLlmClient>,
        calls: AtomicUsize,
        after: usize,
        shutdown: watch::Sender<bool>,
    }

    #[async_trait]
    impl LlmClient for ShutdownAfter {
        async fn complete(&self, request: CompletionRequest) -> std::result::Result<CompletionResponse, LlmError> {
            let result = self.inner.complete(request).await;
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
                self.shutdown.send_replace(true);
            }
            result
        }

        fn model(&self) -> &str {
            self.inner.model()
        }
    }

    #[tokio::test]
    async fn test_shutdown_between_tasks() {
        let mock = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::text("1. first\n2. second"),
            CompletionResponse::text("first done"),
        ]));
        let (tx, rx) = watch::channel(false);
        let llm = Arc::new(ShutdownAfter {
            inner: mock.clone(),
            calls: AtomicUsize::new(0),
            after: 2,
            shutdown: tx,
        });
        let mut h = harness_with(llm, mock, settings(None, 0));
        h.controller.shutdown = rx;

        let report = h.controller.run().await;
        assert_eq!(report.exit, LoopExit::Shutdown);
        assert_eq!(report.iterations, 0);
        let records = h.store.recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_sleep_or_shutdown_wakes_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        let sleeper = tokio::spawn(async move { sleep_or_shutdown(&mut rx, Duration::from_secs(3600)).await });
        tx.send(true).unwrap();
        assert!(sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_sleep_or_shutdown_zero_duration() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(!sleep_or_shutdown(&mut rx, Duration::ZERO).await);
    }
}
