use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::Alert;

/// Errors that prevent an incident from being opened
#[derive(Debug, Error, PartialEq)]
pub enum IncidentError {
    #[error("Malformed alert: {0}")]
    MalformedAlert(String),
}

/// Incident severity
///
/// Variants are declared from least to most urgent so that `Ord` follows
/// urgency: `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    #[serde(rename = "P4-Low")]
    Low,
    #[default]
    #[serde(rename = "P3-Medium")]
    Medium,
    #[serde(rename = "P2-High")]
    High,
    #[serde(rename = "P1-Critical")]
    Critical,
}

impl Severity {
    /// Canonical label (`P1-Critical`, ...)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "P1-Critical",
            Self::High => "P2-High",
            Self::Medium => "P3-Medium",
            Self::Low => "P4-Low",
        }
    }

    /// Lenient parse. Never fails: anything unrecognised is `P3-Medium`.
    ///
    /// Accepts the canonical labels and the bare `P1`..`P4` codes, ignoring
    /// case and surrounding whitespace.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "p1-critical" | "p1" => Self::Critical,
            "p2-high" | "p2" => Self::High,
            "p3-medium" | "p3" => Self::Medium,
            "p4-low" | "p4" => Self::Low,
            _ => Self::default(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Incident lifecycle phase, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    AlertReceived,
    Triage,
    Diagnosis,
    Remediation,
    Communication,
    Resolved,
}

impl Phase {
    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AlertReceived => "Alert Received",
            Self::Triage => "Triage",
            Self::Diagnosis => "Diagnosis",
            Self::Remediation => "Remediation",
            Self::Communication => "Communication",
            Self::Resolved => "Resolved",
        }
    }

    /// Lowercase name used in task identifiers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlertReceived => "alert_received",
            Self::Triage => "triage",
            Self::Diagnosis => "diagnosis",
            Self::Remediation => "remediation",
            Self::Communication => "communication",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single entry of the incident timeline
///
/// Events are only reachable through shared references once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    timestamp: DateTime<Utc>,
    phase: Phase,
    agent: String,
    summary: String,
    /// Raw dispatch result, kept for audit only
    details: Value,
}

impl TimelineEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn details(&self) -> &Value {
        &self.details
    }
}

/// Lifecycle record of one incident
///
/// Mutated only by the orchestration run that opened it. Once the phase is
/// `Resolved` every mutator becomes a no-op.
#[derive(Debug, Clone)]
pub struct Incident {
    id: String,
    title: String,
    alert: Alert,
    severity: Option<Severity>,
    phase: Phase,
    timeline: Vec<TimelineEvent>,
    root_cause: String,
    remediation_action: String,
    postmortem: String,
    started_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl Incident {
    /// Open a new incident from an inbound alert
    pub fn open(alert: Alert) -> Result<Self, IncidentError> {
        let title = alert.title()?;
        let started_at = Utc::now();
        Ok(Self {
            id: generate_id(started_at),
            title,
            alert,
            severity: None,
            phase: Phase::AlertReceived,
            timeline: Vec::new(),
            root_cause: String::new(),
            remediation_action: String::new(),
            postmortem: String::new(),
            started_at,
            resolved_at: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn alert(&self) -> &Alert {
        &self.alert
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.timeline
    }

    pub fn root_cause(&self) -> &str {
        &self.root_cause
    }

    pub fn remediation_action(&self) -> &str {
        &self.remediation_action
    }

    pub fn postmortem(&self) -> &str {
        &self.postmortem
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == Phase::Resolved
    }

    /// Time to resolution in seconds, `None` while unresolved
    pub fn mttr_seconds(&self) -> Option<f64> {
        let resolved_at = self.resolved_at?;
        (resolved_at - self.started_at)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
    }

    /// Append a timeline event and advance the current phase
    ///
    /// Returns `false` without recording anything if `phase` would move the
    /// incident backwards or the incident is already resolved.
    pub fn record(
        &mut self,
        phase: Phase,
        agent: impl Into<String>,
        summary: impl Into<String>,
        details: Value,
    ) -> bool {
        if self.is_resolved() || phase < self.phase || phase == Phase::Resolved {
            return false;
        }
        let timestamp = self.next_timestamp();
        self.timeline.push(TimelineEvent {
            timestamp,
            phase,
            agent: agent.into(),
            summary: summary.into(),
            details,
        });
        self.phase = phase;
        true
    }

    /// Set severity. Only the first assignment sticks.
    pub fn set_severity(&mut self, severity: Severity) -> bool {
        if self.severity.is_some() || self.is_resolved() {
            return false;
        }
        self.severity = Some(severity);
        true
    }

    pub fn set_root_cause(&mut self, root_cause: impl Into<String>) {
        if !self.is_resolved() {
            self.root_cause = root_cause.into();
        }
    }

    pub fn set_remediation_action(&mut self, action: impl Into<String>) {
        if !self.is_resolved() {
            self.remediation_action = action.into();
        }
    }

    pub fn set_postmortem(&mut self, postmortem: impl Into<String>) {
        if !self.is_resolved() {
            self.postmortem = postmortem.into();
        }
    }

    /// Mark the incident resolved. Idempotent.
    pub fn resolve(&mut self) {
        if self.is_resolved() {
            return;
        }
        self.resolved_at = Some(self.next_timestamp());
        self.phase = Phase::Resolved;
    }

    /// Read-only projection for reporting and storage
    pub fn snapshot(&self) -> IncidentSnapshot {
        IncidentSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            severity: self.severity,
            phase: self.phase,
            root_cause: self.root_cause.clone(),
            remediation_action: self.remediation_action.clone(),
            postmortem: self.postmortem.clone(),
            mttr_seconds: self.mttr_seconds(),
            started_at: self.started_at,
            resolved_at: self.resolved_at,
            timeline: self
                .timeline
                .iter()
                .map(|e| TimelineEntry {
                    timestamp: e.timestamp,
                    phase: e.phase,
                    agent: e.agent.clone(),
                    summary: e.summary.clone(),
                })
                .collect(),
        }
    }

    /// Current time, clamped so timestamps never go backwards
    fn next_timestamp(&self) -> DateTime<Utc> {
        let floor = self
            .timeline
            .last()
            .map(|e| e.timestamp)
            .unwrap_or(self.started_at);
        Utc::now().max(floor)
    }
}

/// `INC-<utc seconds>-<random suffix>`; the suffix keeps ids unique within one second
fn generate_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("INC-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}

/// Serializable projection of an incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentSnapshot {
    pub id: String,
    pub title: String,
    pub severity: Option<Severity>,
    pub phase: Phase,
    pub root_cause: String,
    pub remediation_action: String,
    #[serde(default)]
    pub postmortem: String,
    pub mttr_seconds: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub timeline: Vec<TimelineEntry>,
}

/// Timeline entry without the raw dispatch payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub agent: String,
    pub summary: String,
}
