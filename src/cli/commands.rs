//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: bootstrap the wallet and drive the agent loop
//! - status: print task progress from the store
//! - capabilities: list what the agent can do

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chainpilot - an autonomous goal-driven onchain agent
#[derive(Parser, Debug)]
#[command(name = "chainpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent loop
    Run {
        /// Initial goal (defaults to agent.initial_goal from config)
        goal: Option<String>,

        /// Stop after this many iterations
        #[arg(short, long)]
        max_iterations: Option<u64>,

        /// Serve the status API while the loop runs
        #[arg(short, long)]
        serve: bool,
    },

    /// Show recent tasks and counts by status
    Status {
        /// Number of recent tasks to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List the capability catalogue
    Capabilities,
}
