//! Chainpilot - an unattended goal-directed agent loop
//!
//! Each iteration plans a goal into tasks, executes every task through the
//! model and a closed set of onchain and social capabilities, records the
//! outcome, and synthesizes the next goal from what was achieved.

pub mod bootstrap;
pub mod capabilities;
pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod llm;
pub mod prompt;
pub mod runner;
pub mod status;
pub mod storage;

pub use error::{AgentError, Result};
