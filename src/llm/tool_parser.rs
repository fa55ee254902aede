//! Tool-call validation against declared input schemas
//!
//! Capability schemas are a small JSON-schema subset: an object with typed
//! `properties`, a `required` list, optional `enum` constraints and an
//! `additionalProperties: false` switch. Anything the model sends is checked
//! here before it is decoded into a typed call.

use serde_json::Value;

use crate::llm::types::{CompletionResponse, StopReason, ToolCall, ToolDefinition};

/// A tool call whose arguments don't satisfy the declared schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{tool}: {reason}")]
pub struct SchemaViolation {
    pub tool: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(tool: &str, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate a tool call's input against a tool definition's schema
pub fn validate_tool_input(call: &ToolCall, definition: &ToolDefinition) -> Result<(), SchemaViolation> {
    let schema = &definition.input_schema;

    let input = call
        .input
        .as_object()
        .ok_or_else(|| SchemaViolation::new(&call.name, "arguments must be a JSON object"))?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            match input.get(field) {
                None | Some(Value::Null) => {
                    return Err(SchemaViolation::new(
                        &call.name,
                        format!("missing required field: {}", field),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    let properties = schema.get("properties").and_then(|p| p.as_object());
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in input {
        let Some(spec) = properties.and_then(|p| p.get(key)) else {
            if closed {
                return Err(SchemaViolation::new(&call.name, format!("unknown field: {}", key)));
            }
            continue;
        };

        if value.is_null() {
            continue;
        }

        if let Some(expected) = spec.get("type").and_then(|t| t.as_str())
            && !type_matches(expected, value)
        {
            return Err(SchemaViolation::new(
                &call.name,
                format!("field {} must be of type {}", key, expected),
            ));
        }

        if let Some(allowed) = spec.get("enum").and_then(|e| e.as_array())
            && !allowed.contains(value)
        {
            return Err(SchemaViolation::new(
                &call.name,
                format!("field {} must be one of {}", key, Value::Array(allowed.clone())),
            ));
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// Check if a response requires tool execution
pub fn needs_tool_execution(response: &CompletionResponse) -> bool {
    !response.tool_calls.is_empty() || response.stop_reason == StopReason::ToolUse
}
