//! Sandboxed evaluation of user-supplied pagination scripts
//!
//! Stop conditions are untrusted JavaScript of the form
//! `(response, pageInfo) => boolean`. Each evaluation runs in a fresh
//! interpreter context with loop-iteration, recursion and stack limits,
//! wrapped in a wall-clock timeout. The only values reachable from inside
//! the script are the two JSON-serialized inputs; the context is created
//! and dropped inside the evaluation call on every exit path.

use crate::error::{Error, Result};
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsValue, Source};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Pagination snapshot passed to stop-condition scripts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// 1-based page counter
    pub page: u32,
    /// 0-based record offset
    pub offset: u64,
    /// Current cursor, if any
    pub cursor: Option<String>,
    /// Items accumulated so far
    pub total_fetched: usize,
}

/// Outcome of one stop-condition evaluation.
///
/// An evaluation failure never panics and never stops pagination by
/// itself: it surfaces as `should_stop: false` plus an error message the
/// engine escalates.
#[derive(Debug, Clone)]
pub struct StopConditionVerdict {
    /// True when the script asked to stop
    pub should_stop: bool,
    /// Set when the script threw, failed to parse, or timed out
    pub error: Option<String>,
}

impl StopConditionVerdict {
    fn stop(should_stop: bool) -> Self {
        Self {
            should_stop,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            should_stop: false,
            error: Some(message.into()),
        }
    }
}

/// Resource limits for one script evaluation
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    /// Wall-clock budget per evaluation
    pub timeout: Duration,
    /// Interpreter loop-iteration ceiling
    pub loop_iterations: u64,
    /// Interpreter recursion ceiling
    pub recursion: usize,
    /// Interpreter stack budget in bytes
    pub stack_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            loop_iterations: 100_000,
            recursion: 400,
            stack_size: 1024 * 1024,
        }
    }
}

/// Evaluator for untrusted pagination scripts
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    limits: SandboxLimits,
}

impl ScriptSandbox {
    /// Create a sandbox with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sandbox with custom limits
    pub fn with_limits(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    /// Run a stop-condition script against a response and page snapshot.
    ///
    /// The interpreter runs on a blocking thread; the loop-iteration limit
    /// bounds scripts that the wall-clock timeout cannot interrupt.
    pub async fn evaluate_stop_condition(
        &self,
        source: &str,
        response: &Value,
        page_info: &PageInfo,
    ) -> StopConditionVerdict {
        let source = source.to_string();
        let response = response.clone();
        let info = match serde_json::to_value(page_info) {
            Ok(v) => v,
            Err(e) => return StopConditionVerdict::failed(format!("pageInfo serialization: {e}")),
        };
        let limits = self.limits.clone();
        let timeout = self.limits.timeout;

        let handle = tokio::task::spawn_blocking(move || {
            match run_bool_script(&source, &response, &info, &limits) {
                Ok(should_stop) => StopConditionVerdict::stop(should_stop),
                Err(message) => StopConditionVerdict::failed(message),
            }
        });

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(verdict)) => {
                debug!(
                    should_stop = verdict.should_stop,
                    failed = verdict.error.is_some(),
                    "stop condition evaluated"
                );
                verdict
            }
            Ok(Err(join_error)) => {
                StopConditionVerdict::failed(format!("stop condition crashed: {join_error}"))
            }
            Err(_) => StopConditionVerdict::failed(format!(
                "stop condition timed out after {}ms",
                timeout.as_millis()
            )),
        }
    }

    /// Evaluate an inline template expression `(sourceData) => ...` with
    /// the variable map injected as `sourceData`. Used by the template
    /// resolver; same per-call context and limits as stop conditions.
    pub fn eval_expression(&self, source: &str, source_data: &Value) -> Result<Value> {
        let mut context = bounded_context(&self.limits);

        let data = JsValue::from_json(source_data, &mut context)
            .map_err(|e| Error::script(source, e.to_string()))?;
        context
            .register_global_property(js_string!("sourceData"), data, Attribute::all())
            .map_err(|e| Error::script(source, e.to_string()))?;

        let program = format!("({})(sourceData)", source.trim());
        let value = context
            .eval(Source::from_bytes(program.as_bytes()))
            .map_err(|e| Error::script(source, e.to_string()))?;

        if value.is_undefined() || value.is_null() {
            return Ok(Value::Null);
        }
        value
            .to_json(&mut context)
            .map_err(|e| Error::script(source, e.to_string()))
    }
}

/// Wrap bare sources into a `(response, pageInfo) => ...` function.
pub fn normalize_stop_condition(source: &str) -> String {
    let trimmed = source.trim();
    if trimmed.starts_with("return") {
        return format!("(response, pageInfo) => {{ {trimmed} }}");
    }
    if is_arrow_function(trimmed) {
        trimmed.to_string()
    } else {
        format!("(response, pageInfo) => {trimmed}")
    }
}

/// Whether a source already is an arrow function, either with a
/// parenthesized parameter list or a single bare parameter
/// (`response => ...`). An arrow buried inside an expression, like
/// `response.items.some(i => i.done)`, does not count.
fn is_arrow_function(source: &str) -> bool {
    let Some((head, _)) = source.split_once("=>") else {
        return false;
    };
    let head = head.trim();
    if head.starts_with('(') {
        return true;
    }
    let mut chars = head.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn bounded_context(limits: &SandboxLimits) -> Context {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(limits.loop_iterations);
    context.runtime_limits_mut().set_recursion_limit(limits.recursion);
    context
        .runtime_limits_mut()
        .set_stack_size_limit(limits.stack_size);
    context
}

fn run_bool_script(
    source: &str,
    response: &Value,
    page_info: &Value,
    limits: &SandboxLimits,
) -> std::result::Result<bool, String> {
    // Fresh context per invocation; dropped when this frame unwinds,
    // error or not.
    let mut context = bounded_context(limits);

    let response_js = JsValue::from_json(response, &mut context).map_err(|e| e.to_string())?;
    context
        .register_global_property(js_string!("response"), response_js, Attribute::all())
        .map_err(|e| e.to_string())?;

    let info_js = JsValue::from_json(page_info, &mut context).map_err(|e| e.to_string())?;
    context
        .register_global_property(js_string!("pageInfo"), info_js, Attribute::all())
        .map_err(|e| e.to_string())?;

    let program = format!("({})(response, pageInfo)", normalize_stop_condition(source));
    let value = context
        .eval(Source::from_bytes(program.as_bytes()))
        .map_err(|e| e.to_string())?;

    Ok(value.to_boolean())
}

#[cfg(test)]
mod tests;
