use serde_json::{Map, Value};

/// Outcome of reading a model reply that was asked to be a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelJson {
    /// The whole reply (after fence stripping) is a JSON object.
    Structured(Map<String, Value>),
    /// An object was recovered from between the outermost braces.
    Partial(Map<String, Value>),
    /// No object could be recovered; carries the trimmed reply.
    TextFallback(String),
}

impl ModelJson {
    pub fn object(&self) -> Option<&Map<String, Value>> {
        match self {
            ModelJson::Structured(map) | ModelJson::Partial(map) => Some(map),
            ModelJson::TextFallback(_) => None,
        }
    }
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if !s.starts_with("```") {
        return s.to_string();
    }
    // Drop the opening fence line (which may carry a language tag).
    let body = match s.find('\n') {
        Some(idx) => &s[idx + 1..],
        None => s.trim_start_matches('`'),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

pub fn parse_model_json(text: &str) -> ModelJson {
    let cleaned = strip_code_blocks(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
        return ModelJson::Structured(map);
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return ModelJson::Partial(map);
            }
        }
    }

    ModelJson::TextFallback(text.trim().to_string())
}

/// A trimmed string field; numbers are rendered, anything else is absent.
pub fn get_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    let value = match map.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// String items of an array field, trimmed, empties dropped. Non-arrays yield an empty list.
pub fn get_string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// A numeric field, accepting numeric strings.
pub fn get_number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
