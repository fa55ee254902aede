//! Agent loop runner.
//!
//! - GoalPlanner: goal -> ordered task descriptions
//! - TaskExecutor: one task through the model and the capability registry
//! - GoalSynthesizer: iteration results -> next goal or satisfied
//! - AccumulatedContext: capped state carried between iterations
//! - LoopController: drives the cycle and owns the context

pub mod backoff;
pub mod context;
pub mod controller;
pub mod executor;
pub mod planner;
pub mod synthesizer;

pub use backoff::{IterationDelay, RetryPolicy};
pub use context::{AccumulatedContext, ContextEntry};
pub use controller::{LoopController, LoopSettings, LoopSnapshot};
pub use executor::{ExecutionFailure, ExecutorSettings, TaskExecutor, TaskOutcome};
pub use planner::{GoalPlanner, PlannedTask, PlannerSettings, PlanningFailure};
pub use synthesizer::{GoalSynthesizer, SynthesisFailure};
