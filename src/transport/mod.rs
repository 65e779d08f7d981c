//! Transport boundaries
//!
//! The engine drives requests through trait objects so the pagination
//! loop never depends on a concrete client:
//! - [`HttpTransport`]: one HTTP request with retry/backoff handled
//!   inside the transport; the final status is reported, not judged
//!   (success/failure classification belongs to the engine).
//! - [`DatabaseTransport`] / [`FileTransferTransport`]: alternate
//!   protocols selected by URL scheme; they bypass pagination entirely.

mod http;
mod rate_limit;

pub use http::{ReqwestTransport, TransportConfig, TransportConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

use crate::error::Result;
use crate::types::{Method, StringMap};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;

/// One fully-resolved HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL (scheme + host + path)
    pub url: String,
    /// Resolved headers
    pub headers: StringMap,
    /// Resolved query parameters
    pub query: StringMap,
    /// Resolved body, if any
    pub body: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Response payload as returned by a transport
#[derive(Debug, Clone)]
pub enum ResponseBody {
    /// Already-parsed JSON
    Structured(Value),
    /// Raw bytes, parsed later by the decode module
    Raw(Bytes),
}

/// Result of one transport call, including retry metadata
#[derive(Debug, Clone)]
pub struct TransportResult {
    /// Final upstream status code
    pub status: u16,
    /// Response headers
    pub headers: StringMap,
    /// Response payload
    pub body: ResponseBody,
    /// How many retries the transport performed
    pub retries_attempted: u32,
    /// Last distinct failure status seen across retries, if any
    pub last_failure_status: Option<u16>,
}

/// HTTP transport boundary
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one logical request (retries happen inside).
    async fn perform(&self, request: HttpRequest) -> Result<TransportResult>;
}

/// Database execution boundary for postgres:// / postgresql:// hosts.
/// The body carries the query description; pagination never applies.
#[async_trait]
pub trait DatabaseTransport: Send + Sync {
    /// Execute the described database call and return its result value.
    async fn call(
        &self,
        url: &str,
        body: Option<&str>,
        payload: &Value,
        credentials: &Value,
    ) -> Result<Value>;
}

/// File-transfer boundary for ftp:// / ftps:// / sftp:// hosts.
#[async_trait]
pub trait FileTransferTransport: Send + Sync {
    /// Execute the described file operation and return its result value.
    async fn call(&self, url: &str, body: Option<&str>, credentials: &Value) -> Result<Value>;
}

/// Scheme classification for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    Http,
    Postgres,
    FileTransfer,
}

/// Classify a host/URL by scheme. Defaults to HTTP for bare hosts.
pub fn classify_scheme(host: &str) -> UrlScheme {
    let lowered = host.trim_start().to_lowercase();
    if lowered.starts_with("postgres://") || lowered.starts_with("postgresql://") {
        UrlScheme::Postgres
    } else if lowered.starts_with("ftp://")
        || lowered.starts_with("ftps://")
        || lowered.starts_with("sftp://")
    {
        UrlScheme::FileTransfer
    } else {
        UrlScheme::Http
    }
}

#[cfg(test)]
mod tests;
