use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::extract::extract;
use super::{prompt, AgentCatalog, AgentRole, CatalogError, DispatchError, TaskDispatcher};
use crate::incident::{Alert, Incident, IncidentError, Phase, Severity};

/// Agent recorded on the ingestion event
const SYSTEM_AGENT: &str = "system";

/// What a phase extracts and what it falls back to
struct PhaseStep {
    phase: Phase,
    field: &'static str,
    default: &'static str,
}

const TRIAGE: PhaseStep = PhaseStep {
    phase: Phase::Triage,
    field: "severity",
    default: "P3-Medium",
};

const DIAGNOSIS: PhaseStep = PhaseStep {
    phase: Phase::Diagnosis,
    field: "root_cause",
    default: "Under investigation",
};

const REMEDIATION: PhaseStep = PhaseStep {
    phase: Phase::Remediation,
    field: "action",
    default: "Manual review required",
};

const COMMUNICATION: PhaseStep = PhaseStep {
    phase: Phase::Communication,
    field: "postmortem",
    default: "",
};

/// Result of one phase's dispatch, after extraction
struct PhaseOutcome {
    agent: String,
    value: String,
    /// Raw result, or the error when the dispatch failed
    details: Value,
}

/// Drives one incident at a time through triage, diagnosis, remediation and
/// communication.
///
/// Phases run strictly in order since each prompt depends on the previous
/// phase's output. A failed dispatch never aborts the run: the phase records
/// its default value and the pipeline moves on. Runs share no mutable state,
/// so one orchestrator can serve concurrent incidents.
pub struct PhaseOrchestrator {
    dispatcher: Arc<dyn TaskDispatcher>,
    catalog: AgentCatalog,
}

impl PhaseOrchestrator {
    pub fn new(dispatcher: Arc<dyn TaskDispatcher>, catalog: AgentCatalog) -> Result<Self, CatalogError> {
        catalog.validate()?;
        Ok(Self { dispatcher, catalog })
    }

    /// Run an alert through the full pipeline and return the resolved incident
    ///
    /// Fails only when the alert cannot be turned into an incident.
    pub async fn handle_alert(&self, alert: Value) -> Result<Incident, IncidentError> {
        let mut incident = Incident::open(Alert::from_value(alert)?)?;
        let summary = format!("Alert received: {}", incident.title());
        incident.record(Phase::AlertReceived, SYSTEM_AGENT, summary, Value::Null);
        info!(incident = incident.id(), title = incident.title(), "alert received");

        let triage = self.run_phase(&incident, &TRIAGE, prompt::triage(&incident)).await;
        let severity = Severity::parse(&triage.value);
        incident.set_severity(severity);
        info!(incident = incident.id(), severity = %severity, "triage complete");
        let triage_details = triage.details.clone();
        Self::finish(&mut incident, &TRIAGE, format!("Classified as {}", severity), triage);

        let message = prompt::diagnosis(&incident, &triage_details);
        let diagnosis = self.run_phase(&incident, &DIAGNOSIS, message).await;
        incident.set_root_cause(diagnosis.value.as_str());
        info!(incident = incident.id(), root_cause = %diagnosis.value, "diagnosis complete");
        let diagnosis_details = diagnosis.details.clone();
        let summary = format!("Root cause: {}", diagnosis.value);
        Self::finish(&mut incident, &DIAGNOSIS, summary, diagnosis);

        let message = prompt::remediation(&incident, &diagnosis_details);
        let remediation = self.run_phase(&incident, &REMEDIATION, message).await;
        incident.set_remediation_action(remediation.value.as_str());
        info!(incident = incident.id(), action = %remediation.value, "remediation complete");
        let summary = format!("Action: {}", remediation.value);
        Self::finish(&mut incident, &REMEDIATION, summary, remediation);

        let message = prompt::communication(&incident);
        let communication = self.run_phase(&incident, &COMMUNICATION, message).await;
        incident.set_postmortem(communication.value.as_str());
        let summary = if communication.value.is_empty() {
            "Incident report not generated"
        } else {
            "Incident report generated"
        };
        info!(incident = incident.id(), "{}", summary);
        Self::finish(&mut incident, &COMMUNICATION, summary.to_string(), communication);

        incident.resolve();
        info!(
            incident = incident.id(),
            mttr_seconds = incident.mttr_seconds().unwrap_or_default(),
            "incident resolved"
        );

        Ok(incident)
    }

    /// Dispatch one phase and extract its field, degrading to the default on failure
    #[tracing::instrument(skip_all, fields(incident = incident.id(), phase = %step.phase))]
    async fn run_phase(&self, incident: &Incident, step: &PhaseStep, message: String) -> PhaseOutcome {
        let task_id = format!("{}-{}", incident.id(), step.phase.as_str());

        let Some(spec) = AgentRole::for_phase(step.phase).and_then(|role| self.catalog.agent_for(role)) else {
            let error = DispatchError::UnknownAgent(step.phase.as_str().to_string());
            return Self::degraded(incident, step, step.phase.as_str().to_string(), error);
        };

        info!(task_id = %task_id, agent = %spec.agent_id, "dispatching");
        match self.dispatcher.dispatch(&task_id, &spec.agent_id, &message).await {
            Ok(result) => PhaseOutcome {
                agent: spec.name.clone(),
                value: extract(&result, step.field, step.default),
                details: result.to_value(),
            },
            Err(error) => Self::degraded(incident, step, spec.name.clone(), error),
        }
    }

    fn degraded(incident: &Incident, step: &PhaseStep, agent: String, error: DispatchError) -> PhaseOutcome {
        warn!(
            incident = incident.id(),
            phase = %step.phase,
            error = %error,
            "dispatch failed, using default {}",
            step.field
        );
        PhaseOutcome {
            agent,
            value: step.default.to_string(),
            details: json!({ "error": error.to_string() }),
        }
    }

    fn finish(incident: &mut Incident, step: &PhaseStep, summary: String, outcome: PhaseOutcome) {
        incident.record(step.phase, outcome.agent, summary, outcome.details);
    }
}
