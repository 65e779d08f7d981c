//! Endpoint config loading
//!
//! Configs ship as YAML or JSON files (or strings, for callers that keep
//! them in a database). Loading validates the obviously-broken cases up
//! front so a bad file fails at startup rather than mid-call.

use crate::error::{Error, Result, ResultExt};
use crate::types::ApiConfig;
use std::path::Path;
use tracing::debug;

/// Load an endpoint config from a file, dispatching on extension
/// (`.json` parses as JSON, everything else as YAML).
pub fn load_config(path: impl AsRef<Path>) -> Result<ApiConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;

    let config = if path.extension().is_some_and(|ext| ext == "json") {
        from_json_str(&contents)?
    } else {
        from_yaml_str(&contents)?
    };

    debug!(endpoint = %config.id, path = %path.display(), "loaded endpoint config");
    Ok(config)
}

/// Parse an endpoint config from a YAML string.
pub fn from_yaml_str(contents: &str) -> Result<ApiConfig> {
    let config: ApiConfig = serde_yaml::from_str(contents)?;
    validate(&config)?;
    Ok(config)
}

/// Parse an endpoint config from a JSON string.
pub fn from_json_str(contents: &str) -> Result<ApiConfig> {
    let config: ApiConfig = serde_json::from_str(contents)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ApiConfig) -> Result<()> {
    if config.id.trim().is_empty() {
        return Err(Error::missing_field("id"));
    }
    if config.url_host.trim().is_empty() {
        return Err(Error::missing_field("urlHost"));
    }
    if let Some(pagination) = &config.pagination {
        if pagination.page_size == Some(0) {
            return Err(Error::config(format!(
                "pageSize must be at least 1 in endpoint '{}'",
                config.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Method, PaginationType};
    use std::io::Write;

    const YAML: &str = r#"
id: list-orders
urlHost: https://api.example.com
urlPath: /v2/orders
method: GET
queryParams:
  page: "{page}"
  limit: "{limit}"
dataPath: data.orders
pagination:
  type: pageBased
  pageSize: 100
"#;

    #[test]
    fn test_from_yaml_str() {
        let config = from_yaml_str(YAML).unwrap();
        assert_eq!(config.id, "list-orders");
        assert_eq!(config.method, Method::GET);
        assert_eq!(config.data_path.as_deref(), Some("data.orders"));
        let pagination = config.pagination.unwrap();
        assert_eq!(pagination.pagination_type, PaginationType::PageBased);
        assert_eq!(pagination.page_size(), 100);
    }

    #[test]
    fn test_from_json_str() {
        let config = from_json_str(
            r#"{
                "id": "get-user",
                "urlHost": "https://api.example.com",
                "urlPath": "/users/{userId}",
                "method": "GET"
            }"#,
        )
        .unwrap();
        assert_eq!(config.id, "get-user");
        assert_eq!(config.url_path, "/users/{userId}");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.id, "list-orders");
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let err = from_json_str(r#"{"id": "x", "urlPath": "/items"}"#).unwrap_err();
        assert!(err.to_string().contains("urlHost"));
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = from_yaml_str(
            r#"
id: broken
urlHost: https://api.example.com
urlPath: /items
pagination:
  type: pageBased
  pageSize: 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pageSize"));
    }

    #[test]
    fn test_unreadable_file_carries_path_context() {
        let err = load_config("/does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("/does/not/exist.yaml"));
    }
}
