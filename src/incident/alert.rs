use chrono::Utc;
use serde_json::{json, Map, Value};

use super::IncidentError;

/// Keys that may carry the alert title, in lookup order
const TITLE_KEYS: [&str; 3] = ["title", "alert_name", "alert.name"];

/// Title used when the alert carries none of the title keys
pub const UNKNOWN_ALERT_TITLE: &str = "Unknown Alert";

/// Inbound alert payload
///
/// No schema is enforced beyond being a key-value object. The payload is kept
/// unmodified on the incident for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    payload: Map<String, Value>,
}

impl Alert {
    /// Wrap a raw JSON value; only objects are accepted
    pub fn from_value(value: Value) -> Result<Self, IncidentError> {
        match value {
            Value::Object(payload) => Ok(Self { payload }),
            other => Err(IncidentError::MalformedAlert(format!(
                "expected a key-value object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Build an alert from a title and the affected service
    pub fn new(title: impl Into<String>, service: Option<&str>) -> Self {
        let mut payload = Map::new();
        payload.insert("title".into(), Value::String(title.into()));
        if let Some(service) = service {
            payload.insert("service".into(), Value::String(service.into()));
        }
        payload.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        Self { payload }
    }

    /// Sample alert used by the offline demo
    pub fn sample() -> Self {
        let mut alert = Self::new("High error rate on payment-service", Some("payment-service"));
        let extra = [
            ("alert.name", json!("error_rate_spike")),
            ("alert.severity", json!("critical")),
            ("source", json!("elastic-alerting")),
            ("error_rate", json!(15.2)),
            ("threshold", json!(5.0)),
        ];
        for (key, value) in extra {
            alert.payload.insert(key.into(), value);
        }
        alert
    }

    /// Resolve the human-readable title
    ///
    /// A missing title falls back to [`UNKNOWN_ALERT_TITLE`]. A title key that
    /// is present but not a non-empty string makes the alert malformed.
    pub fn title(&self) -> Result<String, IncidentError> {
        for key in TITLE_KEYS {
            match self.payload.get(key) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) if !s.trim().is_empty() => return Ok(s.trim().to_string()),
                Some(Value::String(_)) => {
                    return Err(IncidentError::MalformedAlert(format!("`{}` is blank", key)))
                }
                Some(other) => {
                    return Err(IncidentError::MalformedAlert(format!(
                        "`{}` must be a string, got {}",
                        key,
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(UNKNOWN_ALERT_TITLE.to_string())
    }

    #[allow(dead_code)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }

    /// Pretty JSON rendering for prompts
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| format!("{:?}", self.payload))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
