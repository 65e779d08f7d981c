//! Call execution engine
//!
//! Drives one endpoint config end to end: variable resolution, scheme
//! dispatch, the pagination loop, response classification and payload
//! accumulation. The loop advances page variables strictly by the
//! declared pagination type; whether a page gets accumulated and whether
//! the loop continues is a separate axis, decided either by built-in
//! heuristics (dedup + short page) or by a user-supplied stop-condition
//! script.

mod types;

pub use types::ExecutionContext;

use crate::classify;
use crate::decode::{self, ContentHint};
use crate::error::{Error, Result};
use crate::merge::smart_merge;
use crate::paths;
use crate::redact::mask_credentials;
use crate::sandbox::{PageInfo, ScriptSandbox};
use crate::template;
use crate::transport::{
    classify_scheme, DatabaseTransport, FileTransferTransport, HttpRequest, HttpTransport,
    ReqwestTransport, ResponseBody, TransportResult, UrlScheme,
};
use crate::types::{
    ApiConfig, CallResult, JsonObject, PaginationConfig, PaginationType, RequestOptions, StringMap,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Engine for executing endpoint configs.
///
/// Holds the transports and the script sandbox; all per-call state lives
/// in an [`ExecutionContext`] created inside [`execute`](Self::execute),
/// so one engine can serve concurrent calls.
pub struct CallEngine {
    http: Arc<dyn HttpTransport>,
    database: Option<Arc<dyn DatabaseTransport>>,
    file_transfer: Option<Arc<dyn FileTransferTransport>>,
    sandbox: ScriptSandbox,
}

impl Default for CallEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallEngine")
            .field("has_database", &self.database.is_some())
            .field("has_file_transfer", &self.file_transfer.is_some())
            .finish_non_exhaustive()
    }
}

impl CallEngine {
    /// Engine with the default reqwest transport
    pub fn new() -> Self {
        Self::with_http_transport(Arc::new(ReqwestTransport::new()))
    }

    /// Engine with a custom HTTP transport
    pub fn with_http_transport(http: Arc<dyn HttpTransport>) -> Self {
        Self {
            http,
            database: None,
            file_transfer: None,
            sandbox: ScriptSandbox::new(),
        }
    }

    /// Attach a database transport for postgres:// hosts
    #[must_use]
    pub fn with_database_transport(mut self, transport: Arc<dyn DatabaseTransport>) -> Self {
        self.database = Some(transport);
        self
    }

    /// Attach a file-transfer transport for ftp:// / sftp:// hosts
    #[must_use]
    pub fn with_file_transfer_transport(
        mut self,
        transport: Arc<dyn FileTransferTransport>,
    ) -> Self {
        self.file_transfer = Some(transport);
        self
    }

    /// Replace the script sandbox (custom limits)
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: ScriptSandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Execute one endpoint config.
    ///
    /// `payload` and `credentials` are flat variable objects available to
    /// every template in the config; credentials win on key collisions.
    /// Returns the merged multi-page payload together with the status and
    /// headers of the last upstream response. Cancellation is dropping
    /// the returned future; each individual request is bounded by
    /// `options.timeout`.
    #[instrument(skip_all, fields(endpoint = %config.id))]
    pub async fn execute(
        &self,
        config: &ApiConfig,
        payload: &Value,
        credentials: &Value,
        options: &RequestOptions,
    ) -> Result<CallResult> {
        validate_pagination_config(config)?;

        let pagination = config.pagination.clone().unwrap_or_default();
        let scripted = pagination.stop_condition.is_some();
        let max_requests = if scripted {
            options
                .max_requests
                .map(|m| m.max(1))
                .unwrap_or(crate::DEFAULT_STOP_CONDITION_MAX_REQUESTS)
        } else {
            crate::MAX_PAGINATION_REQUESTS
        };

        let mut ctx = ExecutionContext::new();
        let mut has_more = true;

        while has_more && ctx.loop_counter < max_requests {
            let variables = build_request_vars(&ctx, &pagination, payload, credentials);

            let host = self
                .resolve_field(&config.url_host, &variables, "urlHost", config)
                .map_err(|e| self.contextualize(e, config, credentials))?;

            // Non-HTTP schemes bypass pagination entirely.
            match classify_scheme(&host) {
                UrlScheme::Postgres => {
                    return self
                        .call_database(config, &host, &variables, payload, credentials)
                        .await
                        .map_err(|e| self.contextualize(e, config, credentials));
                }
                UrlScheme::FileTransfer => {
                    return self
                        .call_file_transfer(config, &host, &variables, credentials)
                        .await
                        .map_err(|e| self.contextualize(e, config, credentials));
                }
                UrlScheme::Http => {}
            }

            let request = self
                .build_http_request(config, &host, &variables, options)
                .map_err(|e| self.contextualize(e, config, credentials))?;

            debug!(
                url = %request.url,
                page = ctx.page,
                offset = ctx.offset,
                cursor = ?ctx.cursor,
                request_number = ctx.loop_counter + 1,
                "dispatching request"
            );

            let result = self.http.perform(request).await?;

            classify::classify_status(
                result.status,
                result.retries_attempted,
                result.last_failure_status,
            )
            .map_err(|e| self.contextualize(e, config, credentials))?;

            let body = decode_body(&result)?;

            classify::detect_embedded_error(&body)
                .map_err(|e| self.contextualize(e, config, credentials))?;

            ctx.last_status = result.status;
            ctx.last_headers = result.headers;

            has_more = if scripted {
                self.accumulate_scripted(&mut ctx, &pagination, config, &body)
                    .await
                    .map_err(|e| self.contextualize(e, config, credentials))?
            } else {
                accumulate_legacy(&mut ctx, &pagination, config, &body)
            };

            // Advancement follows the declared type only; the stop
            // condition never moves page variables.
            match pagination.pagination_type {
                PaginationType::Disabled => {
                    if !scripted {
                        has_more = false;
                    }
                }
                PaginationType::PageBased => ctx.page += 1,
                PaginationType::OffsetBased => {
                    ctx.offset += u64::from(pagination.page_size());
                }
                PaginationType::CursorBased => match next_cursor(&body, &pagination) {
                    Some(cursor) => ctx.cursor = Some(cursor),
                    None => {
                        ctx.cursor = None;
                        has_more = false;
                    }
                },
            }

            ctx.loop_counter += 1;
        }

        if has_more && ctx.loop_counter >= max_requests {
            warn!(
                endpoint = %config.id,
                requests = ctx.loop_counter,
                "pagination hit the request ceiling before the data ended"
            );
        }

        Ok(shape_result(ctx, &pagination))
    }

    /// Resolve one templated config field, enriching template errors with
    /// the field being resolved.
    fn resolve_field(
        &self,
        raw: &str,
        variables: &Value,
        field: &str,
        config: &ApiConfig,
    ) -> Result<String> {
        template::render(raw, variables, &self.sandbox).map_err(|e| match e {
            Error::UndefinedVariable { variable } => Error::UndefinedVariable {
                variable: format!("{variable} (while resolving {field} of '{}')", config.id),
            },
            Error::ScriptExecution {
                expression,
                message,
            } => Error::ScriptExecution {
                expression,
                message: format!("{message} (while resolving {field} of '{}')", config.id),
            },
            other => other,
        })
    }

    fn build_http_request(
        &self,
        config: &ApiConfig,
        host: &str,
        variables: &Value,
        options: &RequestOptions,
    ) -> Result<HttpRequest> {
        let path = self.resolve_field(&config.url_path, variables, "urlPath", config)?;
        let url = ApiConfig::join_url(&ensure_http_scheme(host), &path);

        let mut headers = StringMap::new();
        if let Some(raw_headers) = &config.headers {
            for (key, raw) in raw_headers {
                let value = self.resolve_field(raw, variables, "headers", config)?;
                if is_dropped_value(&value) {
                    continue;
                }
                let value = if key.eq_ignore_ascii_case("authorization") {
                    crate::auth::normalize_authorization(&value)
                } else {
                    value
                };
                headers.insert(key.clone(), value);
            }
        }

        let mut query = StringMap::new();
        if let Some(raw_query) = &config.query_params {
            for (key, raw) in raw_query {
                let value = self.resolve_field(raw, variables, "queryParams", config)?;
                if is_dropped_value(&value) {
                    continue;
                }
                query.insert(key.clone(), value);
            }
        }

        let body = match &config.body {
            Some(raw) if !raw.is_empty() => {
                Some(self.resolve_field(raw, variables, "body", config)?)
            }
            _ => None,
        };

        Ok(HttpRequest {
            method: config.method,
            url,
            headers,
            query,
            body,
            timeout: options.timeout,
        })
    }

    async fn call_database(
        &self,
        config: &ApiConfig,
        host: &str,
        variables: &Value,
        payload: &Value,
        credentials: &Value,
    ) -> Result<CallResult> {
        let Some(transport) = &self.database else {
            return Err(Error::UnsupportedScheme {
                scheme: "postgres".to_string(),
            });
        };
        let body = match &config.body {
            Some(raw) if !raw.is_empty() => {
                Some(self.resolve_field(raw, variables, "body", config)?)
            }
            _ => None,
        };
        let path = self.resolve_field(&config.url_path, variables, "urlPath", config)?;
        let url = ApiConfig::join_url(host, &path);
        let data = transport
            .call(&url, body.as_deref(), payload, credentials)
            .await?;
        Ok(CallResult {
            data,
            status_code: 200,
            headers: StringMap::new(),
        })
    }

    async fn call_file_transfer(
        &self,
        config: &ApiConfig,
        host: &str,
        variables: &Value,
        credentials: &Value,
    ) -> Result<CallResult> {
        let Some(transport) = &self.file_transfer else {
            return Err(Error::UnsupportedScheme {
                scheme: "ftp/sftp".to_string(),
            });
        };
        let body = match &config.body {
            Some(raw) if !raw.is_empty() => {
                Some(self.resolve_field(raw, variables, "body", config)?)
            }
            _ => None,
        };
        let path = self.resolve_field(&config.url_path, variables, "urlPath", config)?;
        let url = ApiConfig::join_url(host, &path);
        let data = transport.call(&url, body.as_deref(), credentials).await?;
        Ok(CallResult {
            data,
            status_code: 200,
            headers: StringMap::new(),
        })
    }

    /// Script-driven accumulation. Every page accumulates; the script
    /// decides continuation. Returns whether to fetch another page.
    async fn accumulate_scripted(
        &self,
        ctx: &mut ExecutionContext,
        pagination: &PaginationConfig,
        config: &ApiConfig,
        body: &Value,
    ) -> Result<bool> {
        let hash = content_hash(body);
        let has_data = has_valid_data(body);

        if ctx.loop_counter == 0 {
            ctx.first_hash = Some(hash.clone());
            ctx.first_had_data = has_data;
        } else if ctx.loop_counter == 1 {
            if ctx.first_hash.as_deref() == Some(hash.as_str()) && has_data && ctx.first_had_data {
                return Err(Error::pagination_integrity(
                    "first two pages returned identical data; pagination variables are not \
                     reaching the upstream request",
                ));
            }
            if !has_data && !ctx.first_had_data {
                return Err(Error::stop_condition(
                    "first two pages contained no data; the stop condition should have \
                     terminated after the first empty page",
                ));
            }
        }

        // Repeat of the immediately previous page: the upstream stopped
        // advancing, end the loop without duplicating data.
        if ctx.loop_counter >= 1 && ctx.previous_hash.as_deref() == Some(hash.as_str()) {
            return Ok(false);
        }
        ctx.previous_hash = Some(hash);

        let page_value = match &config.data_path {
            Some(data_path) => paths::extract(body, data_path)
                .cloned()
                .unwrap_or(Value::Null),
            None => body.clone(),
        };

        match page_value {
            Value::Array(items) => ctx.all_results.extend(items),
            Value::Object(_) if config.data_path.is_none() => {
                // Object pages without a dataPath merge into one value.
                if ctx.all_results.len() == 1 && ctx.all_results[0].is_object() {
                    ctx.all_results[0] = smart_merge(&ctx.all_results[0], &page_value);
                } else {
                    ctx.all_results.push(page_value);
                }
            }
            Value::Null => {}
            other => ctx.all_results.push(other),
        }

        let source = pagination
            .stop_condition
            .as_deref()
            .unwrap_or_default();
        let response = script_response(body, &ctx.last_headers);
        let info = PageInfo {
            page: ctx.page,
            offset: ctx.offset,
            cursor: ctx.cursor.clone(),
            total_fetched: ctx.all_results.len(),
        };

        let verdict = self
            .sandbox
            .evaluate_stop_condition(source, &response, &info)
            .await;
        if let Some(error) = verdict.error {
            return Err(Error::stop_condition(error));
        }
        Ok(!verdict.should_stop)
    }

    /// Fold endpoint identity and masked request context into engine
    /// errors so callers (and the self-healing loop) see what failed.
    fn contextualize(&self, error: Error, config: &ApiConfig, credentials: &Value) -> Error {
        let pagination_note = config.pagination.as_ref().map_or_else(String::new, |p| {
            format!(
                ", pagination {:?} pageSize {}",
                p.pagination_type,
                p.page_size()
            )
        });
        let suffix = match &config.instruction {
            Some(instruction) => {
                format!(" [endpoint '{}'{pagination_note}: {instruction}]", config.id)
            }
            None => format!(" [endpoint '{}'{pagination_note}]", config.id),
        };
        match error {
            Error::Call { status, message } => Error::Call {
                status,
                message: mask_credentials(&format!("{message}{suffix}"), credentials),
            },
            Error::RateLimited { message } => Error::RateLimited {
                message: mask_credentials(&format!("{message}{suffix}"), credentials),
            },
            Error::PaginationIntegrity { message } => Error::PaginationIntegrity {
                message: mask_credentials(&format!("{message}{suffix}"), credentials),
            },
            Error::StopCondition { message } => Error::StopCondition {
                message: mask_credentials(&format!("{message}{suffix}"), credentials),
            },
            other => other,
        }
    }
}

/// Fail fast when the declared pagination type cannot take effect: the
/// templated request fields (host, path, headers, query, body) must
/// reference the advancing variable somewhere. Only those fields count,
/// so config keys like `pageSize` never satisfy the check.
fn validate_pagination_config(config: &ApiConfig) -> Result<()> {
    let Some(pagination) = &config.pagination else {
        return Ok(());
    };
    let Some(variable) = pagination.pagination_type.required_variable() else {
        return Ok(());
    };

    let request_shape = json!({
        "urlHost": config.url_host,
        "urlPath": config.url_path,
        "headers": config.headers,
        "queryParams": config.query_params,
        "body": config.body,
    })
    .to_string();

    if request_shape.contains(variable) {
        return Ok(());
    }
    Err(Error::config(format!(
        "pagination type {:?} requires a '{variable}' variable reference in the request \
         (urlPath, headers, queryParams or body) of endpoint '{}'",
        pagination.pagination_type, config.id
    )))
}

/// One flat variable object per iteration: pagination variables first,
/// then payload, then credentials (later entries win on collisions).
/// An absent cursor is exposed as null, which renders as an empty string.
fn build_request_vars(
    ctx: &ExecutionContext,
    pagination: &PaginationConfig,
    payload: &Value,
    credentials: &Value,
) -> Value {
    let mut vars = JsonObject::new();
    vars.insert("page".to_string(), json!(ctx.page));
    vars.insert("offset".to_string(), json!(ctx.offset));
    vars.insert(
        "cursor".to_string(),
        ctx.cursor.clone().map_or(Value::Null, Value::String),
    );
    vars.insert("limit".to_string(), json!(pagination.page_size()));
    vars.insert("pageSize".to_string(), json!(pagination.page_size()));

    if let Some(map) = payload.as_object() {
        for (key, value) in map {
            vars.insert(key.clone(), value.clone());
        }
    }
    if let Some(map) = credentials.as_object() {
        for (key, value) in map {
            vars.insert(key.clone(), value.clone());
        }
    }
    Value::Object(vars)
}

/// Heuristic accumulation for configs without a stop condition.
/// Returns whether to fetch another page.
fn accumulate_legacy(
    ctx: &mut ExecutionContext,
    pagination: &PaginationConfig,
    config: &ApiConfig,
    body: &Value,
) -> bool {
    let page_value = match &config.data_path {
        Some(data_path) => paths::extract(body, data_path)
            .cloned()
            .unwrap_or(Value::Null),
        None => body.clone(),
    };

    match page_value {
        Value::Array(items) => {
            // Identical page repeated: upstream ignored the page variables.
            let hash = content_hash(&Value::Array(items.clone()));
            if ctx.seen_hashes.contains(&hash) {
                return false;
            }
            ctx.seen_hashes.insert(hash);

            let count = items.len();
            ctx.all_results.extend(items);
            // A short page is the last page.
            count >= pagination.page_size() as usize
        }
        Value::Object(_) if ctx.all_results.is_empty() => {
            // Single-object responses are complete results.
            ctx.all_results.push(page_value);
            false
        }
        Value::Null => false,
        _ => false,
    }
}

fn decode_body(result: &TransportResult) -> Result<Value> {
    match &result.body {
        ResponseBody::Structured(value) => Ok(value.clone()),
        ResponseBody::Raw(bytes) => decode::parse_body(bytes, ContentHint::Auto),
    }
}

/// The `response` object a stop condition sees: the parsed body plus its
/// fields spread at the top level, with `data` and `headers` always set.
fn script_response(body: &Value, headers: &StringMap) -> Value {
    let mut out = JsonObject::new();
    if let Some(map) = body.as_object() {
        for (key, value) in map {
            out.insert(key.clone(), value.clone());
        }
    }
    out.insert("data".to_string(), body.clone());
    out.insert(
        "headers".to_string(),
        json!(headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<JsonObject>()),
    );
    Value::Object(out)
}

/// Next cursor from the parsed body. Empty strings, nulls, zero and
/// `false` all mean the cursor chain ended.
fn next_cursor(body: &Value, pagination: &PaginationConfig) -> Option<String> {
    match paths::extract(body, pagination.cursor_path())? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// SHA-256 over the serialized form. serde_json serializes object keys
/// in a deterministic order, so identical upstream pages hash identically.
fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a page carries anything worth keeping: a non-empty array, or
/// an object with a non-empty array or non-null scalar field.
fn has_valid_data(body: &Value) -> bool {
    match body {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(|v| match v {
            Value::Array(items) => !items.is_empty(),
            Value::Object(_) => has_valid_data(v),
            Value::Null => false,
            _ => true,
        }),
        Value::Null => false,
        _ => true,
    }
}

fn ensure_http_scheme(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Values that drop their header/query entry instead of being sent.
fn is_dropped_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "undefined" || trimmed == "null"
}

/// Shape the accumulated pages into the final payload.
fn shape_result(ctx: ExecutionContext, pagination: &PaginationConfig) -> CallResult {
    let data = if pagination.pagination_type == PaginationType::CursorBased {
        json!({
            "next_cursor": ctx.cursor,
            "results": ctx.all_results,
        })
    } else {
        let mut results = ctx.all_results;
        if results.len() == 1 {
            results.remove(0)
        } else {
            Value::Array(results)
        }
    };

    CallResult {
        data,
        status_code: ctx.last_status,
        headers: ctx.last_headers,
    }
}
