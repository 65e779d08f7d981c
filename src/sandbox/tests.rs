//! Tests for the script sandbox

use super::*;
use serde_json::json;

fn page_info() -> PageInfo {
    PageInfo {
        page: 2,
        offset: 50,
        cursor: Some("abc".to_string()),
        total_fetched: 50,
    }
}

#[test]
fn test_normalize_arrow_source_unchanged() {
    let src = "(response, pageInfo) => !response.data.has_more";
    assert_eq!(normalize_stop_condition(src), src);
}

#[test]
fn test_normalize_return_statement_wrapped() {
    let normalized = normalize_stop_condition("return response.data.items.length === 0;");
    assert_eq!(
        normalized,
        "(response, pageInfo) => { return response.data.items.length === 0; }"
    );
}

#[test]
fn test_normalize_bare_expression_wrapped() {
    let normalized = normalize_stop_condition("response.data.done");
    assert_eq!(normalized, "(response, pageInfo) => response.data.done");
}

#[test]
fn test_normalize_single_param_arrow_unchanged() {
    let src = "response => response.data.done";
    assert_eq!(normalize_stop_condition(src), src);
}

#[test]
fn test_normalize_inner_arrow_stays_an_expression() {
    let normalized = normalize_stop_condition("response.items.some(i => i.done)");
    assert_eq!(
        normalized,
        "(response, pageInfo) => response.items.some(i => i.done)"
    );
}

#[tokio::test]
async fn test_stop_condition_true() {
    let sandbox = ScriptSandbox::new();
    let response = json!({"data": {"has_more": false}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition(
            "(response, pageInfo) => !response.data.has_more",
            &response,
            &page_info(),
        )
        .await;
    assert!(verdict.should_stop);
    assert!(verdict.error.is_none());
}

#[tokio::test]
async fn test_stop_condition_continue() {
    let sandbox = ScriptSandbox::new();
    let response = json!({"data": {"items": [1, 2, 3]}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition(
            "(response, pageInfo) => response.data.items.length === 0",
            &response,
            &page_info(),
        )
        .await;
    assert!(!verdict.should_stop);
    assert!(verdict.error.is_none());
}

#[tokio::test]
async fn test_single_param_arrow_evaluates_its_body() {
    let sandbox = ScriptSandbox::new();
    let response = json!({"data": {"done": false}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition("response => response.data.done", &response, &page_info())
        .await;
    // The body must be evaluated, not wrapped into a function value that
    // coerces to true.
    assert!(!verdict.should_stop);
    assert!(verdict.error.is_none());
}

#[tokio::test]
async fn test_page_info_fields_visible() {
    let sandbox = ScriptSandbox::new();
    let response = json!({"data": {}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition(
            "(response, pageInfo) => pageInfo.page === 2 && pageInfo.offset === 50 \
             && pageInfo.cursor === 'abc' && pageInfo.totalFetched === 50",
            &response,
            &page_info(),
        )
        .await;
    assert!(verdict.should_stop, "pageInfo snapshot should match");
}

#[tokio::test]
async fn test_thrown_error_becomes_verdict() {
    let sandbox = ScriptSandbox::new();
    let response = json!({"data": {}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition(
            "(response, pageInfo) => undefinedVariable.field",
            &response,
            &page_info(),
        )
        .await;
    assert!(!verdict.should_stop, "errors default to continue");
    let message = verdict.error.expect("error must be reported");
    assert!(!message.is_empty());
}

#[tokio::test]
async fn test_runaway_loop_is_bounded() {
    let sandbox = ScriptSandbox::with_limits(SandboxLimits {
        timeout: std::time::Duration::from_secs(5),
        loop_iterations: 10_000,
        ..SandboxLimits::default()
    });
    let response = json!({"data": {}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition(
            "(response, pageInfo) => { while (true) {} }",
            &response,
            &page_info(),
        )
        .await;
    assert!(!verdict.should_stop);
    assert!(verdict.error.is_some(), "runaway loop must be cut off");
}

#[tokio::test]
async fn test_truthy_return_coerced_to_bool() {
    let sandbox = ScriptSandbox::new();
    let response = json!({"data": {"next": "tok"}, "headers": {}});
    let verdict = sandbox
        .evaluate_stop_condition("(response, pageInfo) => response.data.next", &response, &page_info())
        .await;
    assert!(verdict.should_stop, "truthy string coerces to true");
}

#[test]
fn test_eval_expression_lookup() {
    let sandbox = ScriptSandbox::new();
    let vars = json!({"limit": 25, "query": "widgets"});
    let value = sandbox
        .eval_expression("(sourceData) => sourceData.limit * 2", &vars)
        .unwrap();
    assert_eq!(value, json!(50));
}

#[test]
fn test_eval_expression_error_is_typed() {
    let sandbox = ScriptSandbox::new();
    let err = sandbox
        .eval_expression("(sourceData) => sourceData.a.b.c", &json!({}))
        .unwrap_err();
    assert!(matches!(
        err,
        crate::error::Error::ScriptExecution { .. }
    ));
}
