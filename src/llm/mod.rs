//! LLM Client Layer - chat-completions integration with tool calling
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenAiClient implementation
//! - MockLlmClient for scripted runs
//! - Tool-call schema validation
//! - Structured (JSON) output extraction

pub mod client;
pub mod openai;
pub mod structured;
pub mod tool_parser;
pub mod types;

pub use client::{LlmClient, LlmError, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use structured::{extract_json_object, parse_structured};
pub use tool_parser::{SchemaViolation, needs_tool_execution, validate_tool_input};
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, ToolResult, Usage,
};
