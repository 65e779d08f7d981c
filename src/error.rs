//! Error types for apiflow
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for apiflow
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Variable Resolution Errors
    // ============================================================================
    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    #[error("Template expression failed: {expression}: {message}")]
    ScriptExecution { expression: String, message: String },

    // ============================================================================
    // Call Errors
    // ============================================================================
    #[error("API call failed with status {status}: {message}")]
    Call { status: u16, message: String },

    #[error("Rate limited (429): {message}")]
    RateLimited { message: String },

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error("Pagination integrity check failed: {message}")]
    PaginationIntegrity { message: String },

    #[error("Pagination stop condition failed: {message}")]
    StopCondition { message: String },

    // ============================================================================
    // Self-Healing Errors
    // ============================================================================
    /// The config generator reported it cannot produce a usable config.
    /// Retry wrappers must pass this through unchanged.
    #[error("Config generation aborted: {message}")]
    Abort { message: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("No transport configured for scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a script execution error
    pub fn script(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptExecution {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a call error
    pub fn call(status: u16, message: impl Into<String>) -> Self {
        Self::Call {
            status,
            message: message.into(),
        }
    }

    /// Create a rate-limited error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create a pagination integrity error
    pub fn pagination_integrity(message: impl Into<String>) -> Self {
        Self::PaginationIntegrity {
            message: message.into(),
        }
    }

    /// Create a stop condition error
    pub fn stop_condition(message: impl Into<String>) -> Self {
        Self::StopCondition {
            message: message.into(),
        }
    }

    /// Create an abort error
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether a self-healing retry wrapper may regenerate the config and
    /// try again. Abort is never retried; configuration and pagination
    /// integrity failures need a new config, so they are candidates.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Check if this error is retryable at the transport level
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::Call { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for apiflow
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::call(502, "upstream exploded");
        assert_eq!(
            err.to_string(),
            "API call failed with status 502: upstream exploded"
        );

        let err = Error::undefined_var("cursor");
        assert_eq!(err.to_string(), "Undefined variable in template: cursor");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::rate_limited("slow down").is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::call(500, "").is_retryable());
        assert!(Error::call(503, "").is_retryable());

        assert!(!Error::call(400, "").is_retryable());
        assert!(!Error::call(404, "").is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::pagination_integrity("dup").is_retryable());
    }

    #[test]
    fn test_abort_is_never_retryable() {
        let err = Error::abort("cannot produce a usable config");
        assert!(err.is_abort());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
