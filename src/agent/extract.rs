//! Best-effort field extraction from agent results
//!
//! Agent output has no fixed schema. Lookup order, first match wins:
//! 1. top-level key
//! 2. key inside a nested `result`, then `data` object
//! 3. free-text content mentioning the field name (case-insensitive);
//!    the first [`SNIPPET_CHARS`] characters of that text are returned
//!
//! Otherwise the caller's default is returned. Extraction never fails.

use serde_json::{Map, Value};

use super::DispatchResult;

/// Maximum length of a free-text snippet, in characters
pub const SNIPPET_CHARS: usize = 200;

/// Extract `field` from a dispatch result, or `default`
pub fn extract(result: &DispatchResult, field: &str, default: &str) -> String {
    let found = match result {
        DispatchResult::Structured(map) => structured_value(map, field)
            .or_else(|| matching_snippet(free_text_candidates(map), field)),
        DispatchResult::FreeText(text) => matching_snippet(vec![text.as_str()], field),
    };
    found.unwrap_or_else(|| default.to_string())
}

fn structured_value(map: &Map<String, Value>, field: &str) -> Option<String> {
    if let Some(value) = present(map.get(field)) {
        return Some(render(value));
    }
    ["result", "data"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_object))
        .find_map(|inner| present(inner.get(field)).map(render))
}

/// Free-text locations, in lookup order
fn free_text_candidates(map: &Map<String, Value>) -> Vec<&str> {
    let mut texts = Vec::new();

    let messages = [
        map.get("result").and_then(|r| r.get("message")),
        map.get("message"),
    ];
    for message in messages.into_iter().flatten() {
        match message {
            Value::String(text) => texts.push(text.as_str()),
            Value::Object(_) => {
                if let Some(parts) = message.get("parts").and_then(Value::as_array) {
                    texts.extend(
                        parts
                            .iter()
                            .filter_map(|p| p.get("text").and_then(Value::as_str)),
                    );
                }
            }
            _ => {}
        }
    }

    if let Some(text) = map.get("text").and_then(Value::as_str) {
        texts.push(text);
    }
    texts
}

fn matching_snippet(texts: Vec<&str>, field: &str) -> Option<String> {
    let needle = field.to_lowercase();
    texts
        .into_iter()
        .find(|text| text.to_lowercase().contains(&needle))
        .map(|text| text.chars().take(SNIPPET_CHARS).collect())
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
