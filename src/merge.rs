//! Content-aware merge for paginated object responses
//!
//! When a stop-condition script drives pagination and the endpoint has no
//! `dataPath`, consecutive non-array pages are merged into one object:
//! arrays under the same key concatenate, nested objects merge
//! recursively, scalars take the newest value.

use serde_json::{Map, Value};

/// Merge a new page into the accumulated value.
pub fn smart_merge(base: &Value, page: &Value) -> Value {
    match (base, page) {
        (Value::Array(a), Value::Array(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Value::Array(out)
        }
        (Value::Object(_), Value::Object(page_map)) => {
            let mut result = match base {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            for (key, value) in page_map {
                if value.is_null() {
                    result.insert(key.clone(), Value::Null);
                    continue;
                }
                let existing = result.get(key).cloned().unwrap_or(Value::Null);
                result.insert(key.clone(), smart_merge(&existing, value));
            }
            Value::Object(result)
        }
        // Scalar vs anything: the new page wins unless it is null.
        _ => {
            if page.is_null() {
                base.clone()
            } else {
                page.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arrays_concatenate() {
        let base = json!({"items": [1, 2], "total": 10});
        let page = json!({"items": [3, 4], "total": 10});
        let merged = smart_merge(&base, &page);
        assert_eq!(merged, json!({"items": [1, 2, 3, 4], "total": 10}));
    }

    #[test]
    fn test_nested_objects_merge() {
        let base = json!({"meta": {"page": 1}, "data": {"users": [{"id": 1}]}});
        let page = json!({"meta": {"page": 2}, "data": {"users": [{"id": 2}]}});
        let merged = smart_merge(&base, &page);
        assert_eq!(merged["meta"]["page"], json!(2));
        assert_eq!(merged["data"]["users"], json!([{"id": 1}, {"id": 2}]));
    }

    #[test]
    fn test_scalar_takes_newest() {
        assert_eq!(smart_merge(&json!("old"), &json!("new")), json!("new"));
        assert_eq!(smart_merge(&json!("kept"), &Value::Null), json!("kept"));
    }

    #[test]
    fn test_null_base_adopts_page() {
        let merged = smart_merge(&Value::Null, &json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }
}
