//! Dotted-path extraction for response bodies
//!
//! Handles `dataPath` and `cursorPath` lookups like "meta.next_cursor".
//! This is a plain recursive walk, not an expression evaluator; paths
//! starting with `$` are treated as pass-through expressions and skipped.

use serde_json::Value;

/// Extract a value at a dotted path. Numeric segments index into arrays.
/// Returns `None` when any segment is missing.
pub fn extract<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    // $-prefixed paths belong to a downstream expression language and are
    // passed through unevaluated.
    if path.starts_with('$') {
        return None;
    }

    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
