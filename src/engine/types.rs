//! Engine types
//!
//! Per-call mutable state for one pagination loop.

use crate::types::StringMap;
use serde_json::Value;
use std::collections::HashSet;

/// Mutable state owned by exactly one invocation of
/// [`CallEngine::execute`](super::CallEngine::execute). Created at call
/// entry, mutated only by the loop body, discarded at loop exit. Never
/// shared across concurrent calls and never reused.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// 1-based page counter (page-based advancement)
    pub page: u32,
    /// 0-based record offset (offset-based advancement)
    pub offset: u64,
    /// Current cursor, absent until the first cursor extraction
    pub cursor: Option<String>,
    /// 0-based request counter, bounded by the request ceiling
    pub loop_counter: u32,
    /// Accumulated page payloads, in upstream page order (append-only)
    pub all_results: Vec<Value>,
    /// Content hashes of every accepted page (legacy dedup path)
    pub seen_hashes: HashSet<String>,
    /// Hash of the first page (stop-condition integrity check)
    pub first_hash: Option<String>,
    /// Whether the first page contained data
    pub first_had_data: bool,
    /// Hash of the immediately previous page (stop-condition path)
    pub previous_hash: Option<String>,
    /// Status code of the most recent response
    pub last_status: u16,
    /// Headers of the most recent response
    pub last_headers: StringMap,
}

impl ExecutionContext {
    /// Fresh state for one call
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Self::default()
        }
    }
}
