//! Credential masking for error context
//!
//! Engine errors carry request fragments for logging and self-healing.
//! Any credential value and any value under a sensitive key is replaced
//! before the message leaves the engine.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

const REDACTION: &str = "***MASKED***";

static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password",
        "secret",
        "token",
        "api_key",
        "apikey",
        "auth_token",
        "client_secret",
        "refresh_token",
        "authorization",
        "access_token",
    ]
    .into_iter()
    .collect()
});

fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    SENSITIVE_KEYS.contains(normalized.as_str())
        || normalized.contains("secret")
        || normalized.contains("token")
        || normalized.contains("key")
}

/// Replace every credential value occurring in `text`. Short values are
/// skipped to avoid masking incidental substrings.
pub fn mask_credentials(text: &str, credentials: &Value) -> String {
    let mut out = text.to_string();
    if let Some(map) = credentials.as_object() {
        for value in map.values() {
            if let Some(s) = value.as_str() {
                let needle = s.trim();
                if needle.len() >= 4 {
                    out = out.replace(needle, REDACTION);
                }
            }
        }
    }
    out
}

/// Mask values under sensitive keys in a JSON object, recursively.
pub fn mask_object(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTION.to_string()));
                } else {
                    out.insert(key.clone(), mask_object(entry));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask_object).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_credentials_in_text() {
        let creds = json!({"apiKey": "sk-verysecret123"});
        let masked = mask_credentials("header Bearer sk-verysecret123 failed", &creds);
        assert_eq!(masked, "header Bearer ***MASKED*** failed");
    }

    #[test]
    fn test_short_values_not_masked() {
        let creds = json!({"pin": "ab"});
        assert_eq!(mask_credentials("ab is fine", &creds), "ab is fine");
    }

    #[test]
    fn test_mask_object_sensitive_keys() {
        let input = json!({"api_key": "abc123", "endpoint": "https://x", "nested": {"token": "t"}});
        let out = mask_object(&input);
        assert_eq!(out["api_key"], json!("***MASKED***"));
        assert_eq!(out["endpoint"], json!("https://x"));
        assert_eq!(out["nested"]["token"], json!("***MASKED***"));
    }
}
