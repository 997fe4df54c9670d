use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::incident::Phase;

/// Specialist role, one per pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Classifies the alert and assigns severity
    Triage,
    /// Correlates logs and metrics to find the root cause
    Diagnosis,
    /// Selects and executes a fix
    Remediation,
    /// Writes status updates and the postmortem
    Communication,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Triage,
        AgentRole::Diagnosis,
        AgentRole::Remediation,
        AgentRole::Communication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Diagnosis => "diagnosis",
            Self::Remediation => "remediation",
            Self::Communication => "communication",
        }
    }

    /// Role responsible for a pipeline phase
    pub fn for_phase(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Triage => Some(Self::Triage),
            Phase::Diagnosis => Some(Self::Diagnosis),
            Phase::Remediation => Some(Self::Remediation),
            Phase::Communication => Some(Self::Communication),
            Phase::AlertReceived | Phase::Resolved => None,
        }
    }
}

/// Remote specialist agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Identifier the dispatcher addresses
    pub agent_id: String,
    /// Name recorded on timeline events
    pub name: String,
    /// Command used by the process dispatcher
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl AgentSpec {
    fn builtin(role: AgentRole, name: &str, description: &str, tools: &[&str]) -> Self {
        let agent_id = format!("incident_cmd_{}", role.as_str());
        Self {
            args: vec!["--agent".into(), agent_id.clone()],
            agent_id,
            name: name.into(),
            command: "incident-agent".into(),
            description: description.into(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("No agent configured for the {0} role")]
    MissingRole(&'static str),
    #[error("Agent id `{0}` is used by more than one role")]
    DuplicateAgentId(String),
}

/// Role to agent mapping, fixed for the lifetime of an orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCatalog {
    agents: HashMap<AgentRole, AgentSpec>,
}

impl Default for AgentCatalog {
    fn default() -> Self {
        let agents = [
            AgentSpec::builtin(
                AgentRole::Triage,
                "Triage Agent",
                "Classifies alerts, assigns severity, routes to specialists",
                &["error_rate_spike", "log_correlation", "network_errors"],
            ),
            AgentSpec::builtin(
                AgentRole::Diagnosis,
                "Diagnosis Agent",
                "Correlates logs and metrics to find the root cause",
                &[
                    "error_rate_spike",
                    "cpu_anomaly",
                    "log_correlation",
                    "service_latency",
                    "memory_pressure",
                    "disk_usage",
                    "recent_deployments",
                    "network_errors",
                ],
            ),
            AgentSpec::builtin(
                AgentRole::Remediation,
                "Remediation Agent",
                "Executes fixes: restart, scale, rollback, drain",
                &["restart_service", "scale_service", "rollback_deployment", "drain_node"],
            ),
            AgentSpec::builtin(
                AgentRole::Communication,
                "Communication Agent",
                "Generates status updates, timelines and postmortems",
                &["error_rate_spike", "log_correlation"],
            ),
        ];

        Self::from_specs(AgentRole::ALL.into_iter().zip(agents))
    }
}

impl AgentCatalog {
    pub fn from_specs(specs: impl IntoIterator<Item = (AgentRole, AgentSpec)>) -> Self {
        Self {
            agents: specs.into_iter().collect(),
        }
    }

    /// Check that every role is covered and agent ids are distinct
    pub fn validate(&self) -> Result<(), CatalogError> {
        for role in AgentRole::ALL {
            if !self.agents.contains_key(&role) {
                return Err(CatalogError::MissingRole(role.as_str()));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for role in AgentRole::ALL {
            if let Some(spec) = self.agents.get(&role) {
                if !seen.insert(spec.agent_id.as_str()) {
                    return Err(CatalogError::DuplicateAgentId(spec.agent_id.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn agent_for(&self, role: AgentRole) -> Option<&AgentSpec> {
        self.agents.get(&role)
    }

    pub fn find_by_id(&self, agent_id: &str) -> Option<&AgentSpec> {
        self.agents.values().find(|a| a.agent_id == agent_id)
    }

    /// Configured agents in pipeline order
    pub fn agents(&self) -> Vec<(AgentRole, &AgentSpec)> {
        AgentRole::ALL
            .into_iter()
            .filter_map(|role| self.agents.get(&role).map(|spec| (role, spec)))
            .collect()
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub catalog: AgentCatalog,
    /// Per-dispatch timeout for the process dispatcher
    #[serde(default)]
    pub dispatch_timeout_secs: Option<u64>,
}

impl OrchestratorConfig {
    /// Load from `config.json` in the commander home, defaults when absent
    pub fn load(home: &Path) -> Result<Self> {
        let config_path = home.join("config.json");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config.json")?;
            let config: serde_json::Value =
                serde_json::from_str(&content).context("Failed to parse config.json")?;

            if let Some(orch) = config.get("orchestrator") {
                return serde_json::from_value(orch.clone())
                    .context("Failed to parse orchestrator config");
            }
        }
        Ok(Self::default())
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_catalog_covers_all_roles() {
        let catalog = AgentCatalog::default();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.agents().len(), 4);

        let triage = catalog.agent_for(AgentRole::Triage).unwrap();
        assert_eq!(triage.agent_id, "incident_cmd_triage");
        assert_eq!(triage.name, "Triage Agent");
        assert!(triage.tools.contains(&"error_rate_spike".to_string()));
    }

    #[test]
    fn test_agents_in_pipeline_order() {
        let catalog = AgentCatalog::default();
        let roles: Vec<_> = catalog.agents().into_iter().map(|(role, _)| role).collect();
        assert_eq!(roles, AgentRole::ALL.to_vec());
    }

    #[test]
    fn test_find_by_id() {
        let catalog = AgentCatalog::default();
        let spec = catalog.find_by_id("incident_cmd_remediation").unwrap();
        assert_eq!(spec.name, "Remediation Agent");
        assert!(catalog.find_by_id("unknown").is_none());
    }

    #[test]
    fn test_validate_missing_role() {
        let defaults = AgentCatalog::default();
        let catalog = AgentCatalog::from_specs(
            [AgentRole::Triage, AgentRole::Diagnosis, AgentRole::Remediation]
                .into_iter()
                .map(|role| (role, defaults.agent_for(role).unwrap().clone())),
        );
        assert_eq!(catalog.validate(), Err(CatalogError::MissingRole("communication")));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let defaults = AgentCatalog::default();
        let triage = defaults.agent_for(AgentRole::Triage).unwrap().clone();
        let catalog = AgentCatalog::from_specs(AgentRole::ALL.into_iter().map(|r| (r, triage.clone())));
        assert!(matches!(catalog.validate(), Err(CatalogError::DuplicateAgentId(_))));
    }

    #[test]
    fn test_role_for_phase() {
        assert_eq!(AgentRole::for_phase(Phase::Triage), Some(AgentRole::Triage));
        assert_eq!(AgentRole::for_phase(Phase::Communication), Some(AgentRole::Communication));
        assert_eq!(AgentRole::for_phase(Phase::AlertReceived), None);
        assert_eq!(AgentRole::for_phase(Phase::Resolved), None);
    }

    #[test]
    fn test_agent_role_serialization() {
        assert_eq!(serde_json::to_string(&AgentRole::Triage).unwrap(), "\"triage\"");
        let role: AgentRole = serde_json::from_str("\"communication\"").unwrap();
        assert_eq!(role, AgentRole::Communication);
    }

    #[test]
    fn test_load_returns_default_when_no_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = OrchestratorConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.catalog, AgentCatalog::default());
        assert!(config.dispatch_timeout().is_none());
    }

    #[test]
    fn test_load_from_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_json = r#"{
            "orchestrator": {
                "dispatch_timeout_secs": 90,
                "catalog": {
                    "agents": {
                        "triage": {"agent_id": "t1", "name": "Triage", "command": "triage-bot"},
                        "diagnosis": {"agent_id": "d1", "name": "Diagnosis", "command": "diag-bot", "args": ["--json"]},
                        "remediation": {"agent_id": "r1", "name": "Remediation", "command": "fix-bot"},
                        "communication": {"agent_id": "c1", "name": "Comms", "command": "comms-bot"}
                    }
                }
            }
        }"#;
        std::fs::write(temp_dir.path().join("config.json"), config_json).unwrap();

        let config = OrchestratorConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.dispatch_timeout(), Some(Duration::from_secs(90)));
        assert!(config.catalog.validate().is_ok());

        let diagnosis = config.catalog.agent_for(AgentRole::Diagnosis).unwrap();
        assert_eq!(diagnosis.command, "diag-bot");
        assert_eq!(diagnosis.args, vec!["--json".to_string()]);
        assert!(diagnosis.tools.is_empty());
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("config.json"), "{ broken").unwrap();
        assert!(OrchestratorConfig::load(temp_dir.path()).is_err());
    }
}
