//! Response classification
//!
//! Decides success/failure independently of pagination: first by status
//! code, then (for 2xx bodies) by structural inspection for application
//! errors hidden behind HTTP 200.

use crate::error::{Error, Result};
use serde_json::Value;

/// Status codes treated as candidate successes (still subject to
/// embedded-error detection).
const SUCCESS_RANGE: std::ops::RangeInclusive<u16> = 200..=205;

/// Classify an upstream status code.
///
/// `retries_attempted` and `last_failure_status` come from the transport
/// and are folded into the message so the self-healing loop sees the full
/// retry history.
pub fn classify_status(
    status: u16,
    retries_attempted: u32,
    last_failure_status: Option<u16>,
) -> Result<()> {
    if SUCCESS_RANGE.contains(&status) {
        return Ok(());
    }

    let mut message = format!("upstream returned status {status} after {retries_attempted} retries");
    if let Some(last) = last_failure_status {
        if last != status {
            message.push_str(&format!(" (last failure during retries: {last})"));
        }
    }

    if status == 429 {
        return Err(Error::rate_limited(message));
    }
    Err(Error::call(status, message))
}

/// Detect application-level errors reported inside a 2xx body.
///
/// Detection is structural: specific key names and non-empty arrays, never
/// substring matching, so fields like `errorCount: 0` or `failedItems: []`
/// pass.
pub fn detect_embedded_error(body: &Value) -> Result<()> {
    if let Some(html) = html_snippet(body) {
        return Err(Error::call(
            200,
            format!("received HTML where structured data was expected: {html}"),
        ));
    }

    if let Some(message) = find_error_signal(body) {
        return Err(Error::call(200, message));
    }

    Ok(())
}

/// Returns a short snippet when the body is an HTML document string.
fn html_snippet(body: &Value) -> Option<String> {
    let text = body.as_str()?;
    let trimmed = text.trim_start();
    let lowered = trimmed.get(..15.min(trimmed.len()))?.to_lowercase();
    if lowered.starts_with("<!doctype html") || lowered.starts_with("<html") {
        let end = trimmed
            .char_indices()
            .nth(120)
            .map_or(trimmed.len(), |(i, _)| i);
        Some(trimmed[..end].to_string())
    } else {
        None
    }
}

/// Walk the body looking for structural error signals:
/// - `errors`: non-empty array (GraphQL style, any depth)
/// - `error`: any non-null value
/// - `error_message`: any non-null value
/// - top-level `failure: true`
fn find_error_signal(body: &Value) -> Option<String> {
    if let Value::Object(map) = body {
        if map.get("failure") == Some(&Value::Bool(true)) {
            return Some("response body reports failure: true".to_string());
        }
    }
    walk_for_errors(body)
}

fn walk_for_errors(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                match key.as_str() {
                    "errors" => {
                        if let Value::Array(items) = entry {
                            if !items.is_empty() {
                                return Some(format!(
                                    "response body contains errors: {}",
                                    summarize(entry)
                                ));
                            }
                        }
                    }
                    "error" | "error_message" => {
                        if !entry.is_null() {
                            return Some(format!(
                                "response body contains '{key}': {}",
                                summarize(entry)
                            ));
                        }
                    }
                    _ => {}
                }
                if let Some(found) = walk_for_errors(entry) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(walk_for_errors),
        _ => None,
    }
}

fn summarize(value: &Value) -> String {
    let text = value.to_string();
    let cut = text
        .char_indices()
        .nth(200)
        .map_or(text.len(), |(i, _)| i);
    if cut < text.len() {
        format!("{}...", &text[..cut])
    } else {
        text
    }
}
