use serde_json::Value;

use crate::errors::ValidationErrors;

pub const UNEXPECTED: &str = "An unexpected error occurred.";

/// Turn a non-2xx body into user-facing messages.
///
/// Accepted shapes: `{"detail": "..."}`, a field map of message lists (with
/// `non_field_errors` first), a bare array, or a bare string.
pub fn error_messages(body: &[u8]) -> Vec<String> {
    let messages = match serde_json::from_slice::<Value>(body) {
        Ok(value) => from_value(&value),
        Err(_) => Vec::new(),
    };
    if messages.is_empty() {
        vec![UNEXPECTED.to_string()]
    } else {
        messages
    }
}

fn from_value(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text).collect();
            if parts.is_empty() {
                Vec::new()
            } else {
                vec![parts.join(" ")]
            }
        }
        Value::Object(map) => {
            if let Some(detail) = map.get("detail").and_then(text) {
                return vec![detail];
            }
            let general = map.get(ValidationErrors::NON_FIELD).into_iter();
            let fields = map
                .iter()
                .filter(|(k, _)| k.as_str() != ValidationErrors::NON_FIELD)
                .map(|(_, v)| v);
            general.chain(fields).flat_map(field_messages).collect()
        }
        _ => Vec::new(),
    }
}

fn field_messages(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
