use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result payload returned by a remote agent
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Key-value result, shape not guaranteed
    Structured(Map<String, Value>),
    /// Plain text answer
    FreeText(String),
}

impl DispatchResult {
    /// Classify raw agent output: JSON objects are structured, anything else is text
    pub fn from_output(output: &str) -> Self {
        let trimmed = output.trim();
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => Self::Structured(map),
            _ => Self::FreeText(trimmed.to_string()),
        }
    }

    /// Opaque audit payload for the timeline
    pub fn to_value(&self) -> Value {
        match self {
            Self::Structured(map) => Value::Object(map.clone()),
            Self::FreeText(text) => Value::String(text.clone()),
        }
    }
}

impl From<Value> for DispatchResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Structured(map),
            Value::String(text) => Self::FreeText(text),
            other => Self::FreeText(other.to_string()),
        }
    }
}

/// Dispatch failures. The orchestrator degrades the phase instead of failing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
    #[error("Failed to start {agent}: {reason}")]
    Spawn { agent: String, reason: String },
    #[error("{agent} timed out after {secs}s")]
    Timeout { agent: String, secs: u64 },
    #[error("{agent} failed (exit code {code:?}): {stderr}")]
    Failed {
        agent: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{0} returned no output")]
    EmptyOutput(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Sends a task to a named remote agent
///
/// `task_id` is unique per incident and phase; implementations may use it for
/// deduplication. Timeouts and retries, if any, belong to the implementation.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        task_id: &str,
        agent_name: &str,
        message: &str,
    ) -> Result<DispatchResult, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_output_json_object() {
        let result = DispatchResult::from_output("  {\"severity\": \"P2-High\"}\n");
        match result {
            DispatchResult::Structured(map) => assert_eq!(map["severity"], "P2-High"),
            other => panic!("expected structured, got {:?}", other),
        }
    }

    #[test]
    fn test_from_output_text() {
        assert_eq!(
            DispatchResult::from_output("Root cause: bad deploy\n"),
            DispatchResult::FreeText("Root cause: bad deploy".into())
        );
        // JSON that is not an object stays text
        assert_eq!(
            DispatchResult::from_output("[1, 2]"),
            DispatchResult::FreeText("[1, 2]".into())
        );
    }

    #[test]
    fn test_from_value() {
        assert!(matches!(
            DispatchResult::from(json!({"action": "rollback"})),
            DispatchResult::Structured(_)
        ));
        assert_eq!(
            DispatchResult::from(json!("done")),
            DispatchResult::FreeText("done".into())
        );
        assert_eq!(DispatchResult::from(json!(3)), DispatchResult::FreeText("3".into()));
    }

    #[test]
    fn test_to_value() {
        let structured = DispatchResult::from(json!({"a": 1}));
        assert_eq!(structured.to_value(), json!({"a": 1}));
        assert_eq!(DispatchResult::FreeText("hi".into()).to_value(), json!("hi"));
    }

    #[test]
    fn test_error_messages() {
        let err = DispatchError::Timeout {
            agent: "incident_cmd_triage".into(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "incident_cmd_triage timed out after 30s");
    }
}
