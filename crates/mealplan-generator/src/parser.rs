//! Turning raw completion text into a candidate plan.

use serde_json::Value;

use crate::error::GenerationError;

/// Strip a surrounding markdown code fence, with or without a language tag.
///
/// Text without a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[start + 3..];
    // Drop the language tag line (```json, ```JSON, ...).
    let body = match after_fence.find('\n') {
        Some(newline) if !after_fence[..newline].trim().contains(['{', '[']) => &after_fence[newline + 1..],
        _ => after_fence,
    };

    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse completion text into a JSON value ready for validation.
pub fn parse_candidate(text: &str) -> Result<Value, GenerationError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(GenerationError::MalformedResult("empty completion".to_string()));
    }

    serde_json::from_str(body).map_err(|e| {
        GenerationError::MalformedResult(format!(
            "JSON parse error: {} - Content: {}",
            e,
            body.chars().take(200).collect::<String>()
        ))
    })
}
