//! # apiflow
//!
//! An execution engine for declarative API calls: give it an endpoint
//! config, a payload and credentials, and it resolves the templates,
//! drives pagination across as many requests as the data needs, tells
//! real failures apart from 2xx responses hiding errors, and hands back
//! one merged payload.
//!
//! ## Features
//!
//! - **Templated configs**: `{var}` / `<<var>>` references and inline
//!   `<<(sourceData) => ...>>` expressions in any request field
//! - **Four pagination strategies**: disabled, page-based, offset-based
//!   and cursor-based, each with a hard request ceiling
//! - **Script-driven stopping**: untrusted `(response, pageInfo) =>
//!   boolean` stop conditions run in a sandboxed interpreter
//! - **Error classification**: status ranges plus structural detection
//!   of errors embedded in 2xx bodies
//! - **Self-healing boundary**: pluggable config regeneration on failure,
//!   with credentials never crossing to the generator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apiflow::{load_config, CallEngine, RequestOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_config("endpoints/list_orders.yaml")?;
//!     let engine = CallEngine::new();
//!
//!     let payload = serde_json::json!({ "since": "2024-01-01" });
//!     let credentials = serde_json::json!({ "apiKey": "sk_live_..." });
//!
//!     let result = engine
//!         .execute(&config, &payload, &credentials, &RequestOptions::default())
//!         .await?;
//!     println!("{} records", result.data.as_array().map_or(1, Vec::len));
//!
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Wire data model and shared type aliases
pub mod types;

/// Authorization header normalization
pub mod auth;

/// Success/failure classification of responses
pub mod classify;

/// Response body decoding (JSON, JSONL, CSV)
pub mod decode;

/// Pagination engine
pub mod engine;

/// Config self-healing boundary
pub mod healing;

/// Endpoint config file loading
pub mod loader;

/// Content-aware merge for object pages
pub mod merge;

/// Dotted-path extraction from JSON values
pub mod paths;

/// Credential masking for error context
pub mod redact;

/// Sandboxed evaluation of pagination scripts
pub mod sandbox;

/// Template interpolation
pub mod template;

/// HTTP and alternate-protocol transports
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use engine::{CallEngine, ExecutionContext};
pub use healing::{
    execute_with_healing, temperature_for_retry, ConfigGenerator, GeneratedConfig,
    GenerationContext,
};
pub use loader::{from_json_str, from_yaml_str, load_config};
pub use sandbox::{PageInfo, SandboxLimits, ScriptSandbox, StopConditionVerdict};
pub use transport::{
    DatabaseTransport, FileTransferTransport, HttpTransport, ReqwestTransport, TransportConfig,
};

// ============================================================================
// Constants
// ============================================================================

/// Hard request ceiling for pagination without a stop condition
pub const MAX_PAGINATION_REQUESTS: u32 = 500;

/// Default request ceiling when a stop condition drives pagination;
/// overridable per call via [`RequestOptions::max_requests`], never
/// unbounded
pub const DEFAULT_STOP_CONDITION_MAX_REQUESTS: u32 = 500;

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default page size when the config does not set one
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default dotted path to the next cursor in a response body
pub const DEFAULT_CURSOR_PATH: &str = "next_cursor";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
