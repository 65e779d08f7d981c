//! Variable resolution for endpoint configs
//!
//! Config fields may reference runtime variables as `{var}` or `<<var>>`
//! (dotted paths into one flat variable map), or compute a value with an
//! inline `<<(sourceData) => ...>>` expression evaluated in the sandbox.
//! Undefined references and failing expressions surface as distinct typed
//! errors so the engine can wrap them with field context.

use crate::error::{Error, Result};
use crate::sandbox::ScriptSandbox;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Matches `<<...>>` references and expressions (non-greedy body)
static ANGLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<(.+?)>>").unwrap());

/// Matches `{variable.path}` references
static BRACE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_]+)*)\}").unwrap()
});

/// Render a template string against a flat variable object.
pub fn render(template: &str, variables: &Value, sandbox: &ScriptSandbox) -> Result<String> {
    let mut result = template.to_string();

    for cap in ANGLE_REGEX.captures_iter(template) {
        let full_match = cap.get(0).unwrap().as_str();
        let inner = cap.get(1).unwrap().as_str().trim();

        let replacement = if is_expression(inner) {
            let value = sandbox.eval_expression(inner, variables)?;
            value_to_string(&value)
        } else {
            lookup(variables, inner)?
        };
        result = result.replace(full_match, &replacement);
    }

    let snapshot = result.clone();
    for cap in BRACE_REGEX.captures_iter(&snapshot) {
        let full_match = cap.get(0).unwrap().as_str();
        let var_path = cap.get(1).unwrap().as_str();

        let replacement = lookup(variables, var_path)?;
        result = result.replace(full_match, &replacement);
    }

    Ok(result)
}

/// Whether an `<<...>>` body is an inline expression rather than a lookup
fn is_expression(inner: &str) -> bool {
    inner.starts_with('(') && inner.contains("=>")
}

fn lookup(variables: &Value, path: &str) -> Result<String> {
    match crate::paths::extract(variables, path) {
        Some(value) => Ok(value_to_string(value)),
        None => Err(Error::undefined_var(path)),
    }
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // Complex types serialize as JSON
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
