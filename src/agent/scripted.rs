use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::{AgentCatalog, AgentRole, DispatchError, DispatchResult, TaskDispatcher};

/// A recorded dispatch call
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCall {
    pub task_id: String,
    pub agent_name: String,
    pub message: String,
}

/// Replays canned results per agent, for offline demos
///
/// Agents without a script answer with `DispatchError::Transport`.
#[derive(Default)]
pub struct ScriptedDispatcher {
    responses: HashMap<String, Result<DispatchResult, DispatchError>>,
    calls: Mutex<Vec<DispatchCall>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `agent_name` with `result`
    pub fn reply(mut self, agent_name: impl Into<String>, result: impl Into<DispatchResult>) -> Self {
        self.responses.insert(agent_name.into(), Ok(result.into()));
        self
    }

    /// Fail every dispatch to `agent_name`
    pub fn fail(mut self, agent_name: impl Into<String>, error: DispatchError) -> Self {
        self.responses.insert(agent_name.into(), Err(error));
        self
    }

    /// Payment-service walkthrough, answering in the shapes real agents use
    pub fn demo(catalog: &AgentCatalog) -> Self {
        let id = |role: AgentRole| {
            catalog
                .agent_for(role)
                .map(|spec| spec.agent_id.clone())
                .unwrap_or_else(|| role.as_str().to_string())
        };

        Self::new()
            .reply(
                id(AgentRole::Triage),
                json!({
                    "severity": "P1-Critical",
                    "affected_services": ["payment-service", "checkout-api"],
                    "error_rate": 15.2,
                }),
            )
            .reply(
                id(AgentRole::Diagnosis),
                json!({
                    "result": {
                        "root_cause": "DB connection pool exhausted after deploy v2.14.0",
                        "evidence": ["connection timeout errors x4312", "deploy at 14:02 UTC"],
                    }
                }),
            )
            .reply(
                id(AgentRole::Remediation),
                json!({
                    "data": {
                        "action": "rollback payment-service to v2.13.2",
                        "status": "completed",
                    }
                }),
            )
            .reply(
                id(AgentRole::Communication),
                json!({
                    "result": {
                        "message": {
                            "role": "agent",
                            "parts": [{
                                "type": "text",
                                "text": "Postmortem: payment-service error rate spiked to 15.2% after deploy \
                                         v2.14.0 exhausted the DB connection pool. Rolled back to v2.13.2; \
                                         error rate back under threshold.",
                            }]
                        }
                    }
                }),
            )
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TaskDispatcher for ScriptedDispatcher {
    async fn dispatch(
        &self,
        task_id: &str,
        agent_name: &str,
        message: &str,
    ) -> Result<DispatchResult, DispatchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DispatchCall {
                task_id: task_id.to_string(),
                agent_name: agent_name.to_string(),
                message: message.to_string(),
            });
        }

        self.responses
            .get(agent_name)
            .cloned()
            .unwrap_or_else(|| {
                Err(DispatchError::Transport(format!(
                    "no scripted response for {}",
                    agent_name
                )))
            })
    }
}
