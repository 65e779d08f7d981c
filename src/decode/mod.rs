//! Response body parsing
//!
//! Transports hand back raw bytes when the upstream response is not
//! already structured. `parse_body` auto-detects the format: JSON, then
//! JSON Lines, then CSV with a header row; anything else comes back as a
//! plain JSON string so the classifier can inspect it (HTML detection
//! relies on this).

mod decoders;

pub use decoders::{decode_csv, decode_json, decode_jsonl};

use crate::error::Result;
use serde_json::Value;

/// Format hint for `parse_body`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentHint {
    /// Try JSON, then JSONL, then CSV, else plain text
    #[default]
    Auto,
    Json,
    Jsonl,
    Csv,
    Text,
}

/// Parse raw response bytes into a JSON value.
pub fn parse_body(bytes: &[u8], hint: ContentHint) -> Result<Value> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.as_ref();

    match hint {
        ContentHint::Json => decode_json(text),
        ContentHint::Jsonl => decode_jsonl(text),
        ContentHint::Csv => decode_csv(text),
        ContentHint::Text => Ok(Value::String(text.to_string())),
        ContentHint::Auto => Ok(auto_detect(text)),
    }
}

fn auto_detect(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if let Ok(value) = decode_json(trimmed) {
        return value;
    }

    // Multiple lines each parsing as JSON: treat as JSONL
    if trimmed.lines().count() > 1 {
        if let Ok(value) = decode_jsonl(trimmed) {
            return value;
        }
        if looks_like_csv(trimmed) {
            if let Ok(value) = decode_csv(trimmed) {
                return value;
            }
        }
    }

    Value::String(text.to_string())
}

/// CSV heuristic: at least two lines, a delimiter in the first line, and
/// a consistent field count on the second.
fn looks_like_csv(text: &str) -> bool {
    let mut lines = text.lines();
    let (Some(first), Some(second)) = (lines.next(), lines.next()) else {
        return false;
    };
    if first.starts_with('<') || first.starts_with('{') || first.starts_with('[') {
        return false;
    }
    let delimiter_count = first.matches(',').count();
    delimiter_count > 0 && second.matches(',').count() == delimiter_count
}

#[cfg(test)]
mod tests;
