//! Decoder implementations

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Parse a JSON document.
pub fn decode_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| Error::decode(format!("Failed to parse JSON: {e}")))
}

/// Parse JSON Lines (one JSON value per line) into an array.
pub fn decode_jsonl(body: &str) -> Result<Value> {
    let mut records = Vec::new();

    for (line_num, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line).map_err(|e| {
            Error::decode(format!("Failed to parse JSONL at line {}: {e}", line_num + 1))
        })?;
        records.push(value);
    }

    Ok(Value::Array(records))
}

/// Parse CSV with a header row into an array of objects.
pub fn decode_csv(body: &str) -> Result<Value> {
    let mut lines = body.lines();

    let headers: Vec<String> = match lines.next() {
        Some(header_line) => parse_csv_line(header_line, ','),
        None => return Ok(Value::Array(Vec::new())),
    };

    let mut records = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields = parse_csv_line(line, ',');
        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = fields.get(i).cloned().unwrap_or_default();
            obj.insert(header.clone(), parse_csv_value(&value));
        }
        records.push(Value::Object(obj));
    }

    Ok(Value::Array(records))
}

/// Parse a CSV line into fields, honoring quotes and escaped quotes
fn parse_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                in_quotes = true;
            }
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
    }

    fields.push(current.trim().to_string());
    fields
}

/// Parse a CSV field into a typed JSON value
fn parse_csv_value(value: &str) -> Value {
    if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }

    if let Ok(n) = value.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }

    match value.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return Value::Null;
    }

    Value::String(value.to_string())
}
