//! Config self-healing boundary
//!
//! When a call fails, the caller may regenerate the endpoint config and
//! retry. The engine never does this on its own: it stays deterministic
//! and side-effect free, and the generator (usually an LLM-backed
//! service) lives behind the [`ConfigGenerator`] trait on the caller's
//! side of the boundary.

use crate::engine::CallEngine;
use crate::error::{Error, Result};
use crate::redact::mask_object;
use crate::types::{ApiConfig, CallResult, RequestOptions};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Everything a generator gets to see about the failed attempt.
///
/// Credentials never cross this boundary: only their key names, so the
/// generator can emit `{key}` template references without learning the
/// values.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// The config that just failed
    pub failed_config: ApiConfig,
    /// Step input payload, sensitive keys masked
    pub step_input: Value,
    /// Names of the available credential variables
    pub credential_keys: Vec<String>,
    /// How many regenerations happened before this one (0-based)
    pub retry_count: u32,
    /// Error messages from all failed attempts so far, oldest first
    pub messages: Vec<String>,
    /// Optional integration hint (API family, docs identifier)
    pub integration: Option<String>,
}

/// A regenerated config plus generator-specific metadata.
#[derive(Debug, Clone)]
pub struct GeneratedConfig {
    /// The config to try next
    pub config: ApiConfig,
    /// Free-form note about what the generator changed
    pub reasoning: Option<String>,
}

/// Boundary for config regeneration backends.
#[async_trait]
pub trait ConfigGenerator: Send + Sync {
    /// Produce a new config for the failed context.
    async fn generate(&self, context: GenerationContext) -> Result<GeneratedConfig>;
}

/// Sampling temperature schedule for regeneration attempts: starts
/// deterministic, loosens with each retry, capped at 1.0.
pub fn temperature_for_retry(retry_count: u32) -> f64 {
    (f64::from(retry_count) * 0.1).min(1.0)
}

/// Execute a config, regenerating and retrying on failure.
///
/// `Error::Abort` passes through unchanged and is never retried; every
/// other error triggers a regeneration until `max_retries` regenerated
/// configs have failed too. Returns the result together with the config
/// that finally worked so the caller can persist it.
pub async fn execute_with_healing(
    engine: &CallEngine,
    generator: &dyn ConfigGenerator,
    config: &ApiConfig,
    payload: &Value,
    credentials: &Value,
    options: &RequestOptions,
    max_retries: u32,
) -> Result<(CallResult, ApiConfig)> {
    let mut current = config.clone();
    let mut messages = Vec::new();

    for retry_count in 0..=max_retries {
        match engine.execute(&current, payload, credentials, options).await {
            Ok(result) => {
                if retry_count > 0 {
                    info!(
                        endpoint = %current.id,
                        retry_count,
                        "call succeeded with regenerated config"
                    );
                }
                return Ok((result, current));
            }
            Err(err) if err.is_abort() => return Err(err),
            Err(err) if retry_count == max_retries => {
                return Err(err);
            }
            Err(err) => {
                warn!(
                    endpoint = %current.id,
                    retry_count,
                    error = %err,
                    "call failed, regenerating config"
                );
                messages.push(err.to_string());

                let context = GenerationContext {
                    failed_config: current.clone(),
                    step_input: mask_object(payload),
                    credential_keys: credential_keys(credentials),
                    retry_count,
                    messages: messages.clone(),
                    integration: None,
                };
                current = generator.generate(context).await?.config;
            }
        }
    }

    // 0..=max_retries always returns or errors inside the loop.
    Err(Error::abort("healing loop exited without a result"))
}

fn credential_keys(credentials: &Value) -> Vec<String> {
    credentials
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
