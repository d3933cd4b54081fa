//! Parsing of the model's textual answer.

use ledger_core::RecognitionResult;

use crate::error::VisionError;

/// Parse the model's answer into a [`RecognitionResult`].
///
/// The answer must be a single JSON object. Surrounding whitespace and a
/// Markdown code fence around the object are tolerated; anything else is a
/// parse error.
pub fn parse_recognition(content: &str) -> Result<RecognitionResult, VisionError> {
    let body = strip_code_fence(content.trim());
    if body.is_empty() {
        return Err(VisionError::EmptyResponse);
    }
    Ok(serde_json::from_str(body)?)
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start().strip_prefix("json").unwrap_or(rest),
    };
    let rest = rest.trim();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
