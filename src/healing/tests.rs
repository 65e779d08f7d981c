//! Tests for the self-healing loop

use super::*;
use crate::transport::{HttpRequest, HttpTransport, ResponseBody, TransportResult};
use crate::types::StringMap;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Transport that succeeds on `/good` and reports 500 everywhere else.
struct PathTransport {
    calls: AtomicU32,
    abort_instead: bool,
}

impl PathTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            abort_instead: false,
        })
    }

    fn aborting() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            abort_instead: true,
        })
    }
}

#[async_trait]
impl HttpTransport for PathTransport {
    async fn perform(&self, request: HttpRequest) -> Result<TransportResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.abort_instead {
            return Err(Error::abort("caller cancelled"));
        }
        let status = if request.url.ends_with("/good") { 200 } else { 500 };
        Ok(TransportResult {
            status,
            headers: StringMap::new(),
            body: ResponseBody::Structured(json!([1])),
            retries_attempted: 0,
            last_failure_status: None,
        })
    }
}

struct FixingGenerator {
    calls: AtomicU32,
    contexts: Mutex<Vec<GenerationContext>>,
}

impl FixingGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConfigGenerator for FixingGenerator {
    async fn generate(&self, context: GenerationContext) -> Result<GeneratedConfig> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut config = context.failed_config.clone();
        self.contexts.lock().unwrap().push(context);
        config.url_path = "/good".to_string();
        Ok(GeneratedConfig {
            config,
            reasoning: Some("switched to the documented path".to_string()),
        })
    }
}

fn config(path: &str) -> ApiConfig {
    ApiConfig {
        id: "ep-heal".to_string(),
        url_host: "https://api.example.com".to_string(),
        url_path: path.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_success_never_invokes_generator() {
    let transport = PathTransport::new();
    let engine = CallEngine::with_http_transport(transport.clone());
    let generator = FixingGenerator::new();

    let (result, final_config) = execute_with_healing(
        &engine,
        &generator,
        &config("/good"),
        &json!({}),
        &json!({}),
        &RequestOptions::default(),
        3,
    )
    .await
    .unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(final_config.url_path, "/good");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_call_is_retried_with_regenerated_config() {
    let transport = PathTransport::new();
    let engine = CallEngine::with_http_transport(transport.clone());
    let generator = FixingGenerator::new();

    let (result, final_config) = execute_with_healing(
        &engine,
        &generator,
        &config("/bad"),
        &json!({"customer": "acme", "token": "sk_live_42"}),
        &json!({"apiKey": "sk_live_42"}),
        &RequestOptions::default(),
        3,
    )
    .await
    .unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(final_config.url_path, "/good");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    let contexts = generator.contexts.lock().unwrap();
    let context = &contexts[0];
    assert_eq!(context.retry_count, 0);
    assert_eq!(context.messages.len(), 1);
    assert_eq!(context.credential_keys, vec!["apiKey".to_string()]);
    // The generator sees key names and masked payload, never the values.
    assert_eq!(context.step_input["customer"], "acme");
    assert_eq!(context.step_input["token"], "***MASKED***");
}

#[tokio::test]
async fn test_abort_is_never_retried() {
    let transport = PathTransport::aborting();
    let engine = CallEngine::with_http_transport(transport.clone());
    let generator = FixingGenerator::new();

    let err = execute_with_healing(
        &engine,
        &generator,
        &config("/good"),
        &json!({}),
        &json!({}),
        &RequestOptions::default(),
        3,
    )
    .await
    .unwrap_err();

    assert!(err.is_abort());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_error() {
    struct HopelessGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ConfigGenerator for HopelessGenerator {
        async fn generate(&self, context: GenerationContext) -> Result<GeneratedConfig> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GeneratedConfig {
                config: context.failed_config,
                reasoning: None,
            })
        }
    }

    let transport = PathTransport::new();
    let engine = CallEngine::with_http_transport(transport.clone());
    let generator = HopelessGenerator {
        calls: AtomicU32::new(0),
    };

    let err = execute_with_healing(
        &engine,
        &generator,
        &config("/bad"),
        &json!({}),
        &json!({}),
        &RequestOptions::default(),
        2,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Call { status: 500, .. }));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_temperature_schedule() {
    assert!((temperature_for_retry(0) - 0.0).abs() < 1e-9);
    assert!((temperature_for_retry(3) - 0.3).abs() < 1e-9);
    assert!((temperature_for_retry(10) - 1.0).abs() < 1e-9);
    assert!((temperature_for_retry(50) - 1.0).abs() < 1e-9);
}
