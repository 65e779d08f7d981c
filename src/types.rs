//! Common types used throughout apiflow
//!
//! The wire data model for endpoint configs plus shared type aliases.
//! Field names serialize as camelCase to match the JSON step definitions
//! produced by config generators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
            Method::HEAD => reqwest::Method::HEAD,
            Method::OPTIONS => reqwest::Method::OPTIONS,
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// How credentials are attached to the request.
///
/// Token acquisition/refresh is out of scope: `OAuth2` only means a
/// caller-supplied access token rides in the Authorization header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    #[default]
    None,
    Header,
    QueryParam,
    Oauth2,
}

// ============================================================================
// Pagination
// ============================================================================

/// Pagination strategy. Governs how the next-page variables advance
/// between iterations; accumulation/termination is a separate axis
/// (presence of a `stop_condition` script).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaginationType {
    #[default]
    #[serde(rename = "disabled", alias = "DISABLED")]
    Disabled,
    #[serde(rename = "pageBased", alias = "PAGE_BASED")]
    PageBased,
    #[serde(rename = "offsetBased", alias = "OFFSET_BASED")]
    OffsetBased,
    #[serde(rename = "cursorBased", alias = "CURSOR_BASED")]
    CursorBased,
}

impl PaginationType {
    /// The variable name the templated config must reference for this
    /// strategy to have any effect.
    pub fn required_variable(self) -> Option<&'static str> {
        match self {
            PaginationType::Disabled => None,
            PaginationType::PageBased => Some("page"),
            PaginationType::OffsetBased => Some("offset"),
            PaginationType::CursorBased => Some("cursor"),
        }
    }
}

/// Pagination configuration (HTTP only; postgres/ftp calls bypass it)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationConfig {
    /// Pagination strategy
    #[serde(rename = "type")]
    pub pagination_type: PaginationType,
    /// Items per page; exposed to templates as `limit` and `pageSize`
    pub page_size: Option<u32>,
    /// Dotted path to the next cursor in the response body
    /// (e.g. "meta.next_cursor"); defaults to `next_cursor`
    pub cursor_path: Option<String>,
    /// JavaScript `(response, pageInfo) => boolean` deciding when to stop.
    /// Its presence switches accumulation into script-driven mode.
    pub stop_condition: Option<String>,
}

impl PaginationConfig {
    /// Effective page size
    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(crate::DEFAULT_PAGE_SIZE)
    }

    /// Effective cursor path
    pub fn cursor_path(&self) -> &str {
        self.cursor_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(crate::DEFAULT_CURSOR_PATH)
    }
}

// ============================================================================
// Endpoint Config
// ============================================================================

/// Declarative description of one logical endpoint. Immutable per
/// execution. Header, query, body, host and path values may contain
/// `{var}` / `<<var>>` template references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Unique identifier for this endpoint
    pub id: String,
    /// Human-readable description, used for error context and self-healing
    pub instruction: Option<String>,
    /// Scheme + host, e.g. "https://api.example.com" or "postgres://..."
    pub url_host: String,
    /// Path portion, e.g. "/v1/items"
    pub url_path: String,
    /// HTTP method
    pub method: Method,
    /// Request headers (templated values)
    pub headers: Option<StringMap>,
    /// Query parameters (templated values)
    pub query_params: Option<StringMap>,
    /// Request body (templated string)
    pub body: Option<String>,
    /// How credentials attach to the request
    pub authentication: Option<AuthType>,
    /// Dotted path to drill into the response before accumulation
    pub data_path: Option<String>,
    /// Pagination behavior
    pub pagination: Option<PaginationConfig>,
}

impl ApiConfig {
    /// Full URL for the resolved host and path
    pub fn join_url(host: &str, path: &str) -> String {
        if path.is_empty() {
            return host.to_string();
        }
        format!(
            "{}/{}",
            host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// ============================================================================
// Call Options & Result
// ============================================================================

/// Per-call options supplied by the caller
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Timeout for each HTTP request
    pub timeout: Duration,
    /// Override for the stop-condition-mode request ceiling.
    /// Clamped to at least 1; never unbounded.
    pub max_requests: Option<u32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
            max_requests: None,
        }
    }
}

impl RequestOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the stop-condition request ceiling
    #[must_use]
    pub fn with_max_requests(mut self, max: u32) -> Self {
        self.max_requests = Some(max.max(1));
        self
    }
}

/// Normalized result of a successful call
#[derive(Debug, Clone, Serialize)]
pub struct CallResult {
    /// Merged response payload
    pub data: JsonValue,
    /// Status code of the last upstream response
    pub status_code: u16,
    /// Headers of the last upstream response
    pub headers: StringMap,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for transport retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_conversion() {
        let get: reqwest::Method = Method::GET.into();
        assert_eq!(reqwest::Method::GET, get);
        let post: reqwest::Method = Method::POST.into();
        assert_eq!(reqwest::Method::POST, post);
    }

    #[test]
    fn test_pagination_type_serde() {
        let t: PaginationType = serde_json::from_str("\"offsetBased\"").unwrap();
        assert_eq!(t, PaginationType::OffsetBased);
        let t: PaginationType = serde_json::from_str("\"OFFSET_BASED\"").unwrap();
        assert_eq!(t, PaginationType::OffsetBased);

        let json = serde_json::to_string(&PaginationType::CursorBased).unwrap();
        assert_eq!(json, "\"cursorBased\"");
    }

    #[test]
    fn test_pagination_required_variable() {
        assert_eq!(PaginationType::Disabled.required_variable(), None);
        assert_eq!(PaginationType::PageBased.required_variable(), Some("page"));
        assert_eq!(
            PaginationType::OffsetBased.required_variable(),
            Some("offset")
        );
        assert_eq!(
            PaginationType::CursorBased.required_variable(),
            Some("cursor")
        );
    }

    #[test]
    fn test_api_config_camel_case() {
        let config: ApiConfig = serde_json::from_str(
            r#"{
                "id": "ep-1",
                "urlHost": "https://api.example.com",
                "urlPath": "/v1/items",
                "method": "GET",
                "dataPath": "data.items",
                "pagination": {"type": "pageBased", "pageSize": 25}
            }"#,
        )
        .unwrap();

        assert_eq!(config.url_host, "https://api.example.com");
        assert_eq!(config.data_path.as_deref(), Some("data.items"));
        let pagination = config.pagination.unwrap();
        assert_eq!(pagination.pagination_type, PaginationType::PageBased);
        assert_eq!(pagination.page_size(), 25);
        assert_eq!(pagination.cursor_path(), "next_cursor");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            ApiConfig::join_url("https://api.example.com/", "/v1/items"),
            "https://api.example.com/v1/items"
        );
        assert_eq!(
            ApiConfig::join_url("https://api.example.com", "v1/items"),
            "https://api.example.com/v1/items"
        );
        assert_eq!(
            ApiConfig::join_url("https://api.example.com", ""),
            "https://api.example.com"
        );
    }

}
