//! CLI module for chainpilot - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
