//! Structured-output extraction
//!
//! Models asked for JSON often wrap it in prose or code fences. These helpers
//! pull the first JSON object out of the text and decode it into a typed value.

use serde::de::DeserializeOwned;

use crate::llm::client::LlmError;

/// Locate the outermost JSON object in `text`
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = strip_code_fence(text.trim());
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode model output into `T`, failing with `SchemaMismatch` when it doesn't fit
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let json = extract_json_object(text)
        .ok_or_else(|| LlmError::SchemaMismatch("no JSON object in model output".to_string()))?;
    serde_json::from_str(json).map_err(|e| LlmError::SchemaMismatch(e.to_string()))
}
