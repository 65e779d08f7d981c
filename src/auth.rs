//! Authorization header normalization
//!
//! Upstream config generators occasionally emit doubled scheme prefixes
//! ("Basic Basic ...") or raw `username:password` Basic credentials.
//! These helpers repair both before the request goes out.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Collapse a doubled "Basic Basic " / "Bearer Bearer " prefix.
pub fn collapse_doubled_scheme(value: &str) -> String {
    for scheme in ["Basic", "Bearer"] {
        let doubled = format!("{scheme} {scheme} ");
        if let Some(rest) = value.strip_prefix(&doubled) {
            return format!("{scheme} {rest}");
        }
    }
    value.to_string()
}

/// Base64-encode the credential part of a `Basic` Authorization value when
/// it is not already encoded. Non-Basic values pass through unchanged, as
/// do values that already round-trip through base64.
pub fn convert_basic_auth_to_base64(value: &str) -> String {
    let Some(raw) = value.strip_prefix("Basic ") else {
        return value.to_string();
    };

    if is_base64(raw) {
        return value.to_string();
    }

    format!("Basic {}", BASE64.encode(raw.as_bytes()))
}

/// Normalize an Authorization header value: collapse doubled prefixes,
/// then repair unencoded Basic credentials.
pub fn normalize_authorization(value: &str) -> String {
    convert_basic_auth_to_base64(&collapse_doubled_scheme(value))
}

fn is_base64(value: &str) -> bool {
    match BASE64.decode(value.as_bytes()) {
        Ok(decoded) => BASE64.encode(decoded) == value,
        Err(_) => false,
    }
}
