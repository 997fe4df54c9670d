use serde_json::Value;

use crate::incident::Incident;

/// Triage task: classify the raw alert
pub fn triage(incident: &Incident) -> String {
    format!(
        r#"Incident {id}: {title}

Classify this alert and identify affected services.
Reply with a JSON object containing at least "severity" (one of P1-Critical, P2-High, P3-Medium, P4-Low).

## Alert
```json
{alert}
```
"#,
        id = incident.id(),
        title = incident.title(),
        alert = incident.alert().to_pretty_json(),
    )
}

/// Diagnosis task: find the root cause given the triage outcome
pub fn diagnosis(incident: &Incident, triage: &Value) -> String {
    format!(
        r#"Incident {id} ({severity}): {title}

Triage summary: {triage}

Query logs and metrics to identify the root cause.
Reply with a JSON object containing at least "root_cause".
"#,
        id = incident.id(),
        severity = severity_label(incident),
        title = incident.title(),
        triage = compact(triage),
    )
}

/// Remediation task: act on the diagnosed root cause
pub fn remediation(incident: &Incident, diagnosis: &Value) -> String {
    format!(
        r#"Incident {id} ({severity}): root cause is '{root_cause}'.

Diagnosis details: {diagnosis}

Select and execute the appropriate remediation action.
Reply with a JSON object containing at least "action".
"#,
        id = incident.id(),
        severity = severity_label(incident),
        root_cause = incident.root_cause(),
        diagnosis = compact(diagnosis),
    )
}

/// Communication task: status update and postmortem from the full record
pub fn communication(incident: &Incident) -> String {
    let timeline = incident
        .timeline()
        .iter()
        .map(|e| {
            format!(
                "- [{}] {}: {}",
                e.timestamp().to_rfc3339(),
                e.agent(),
                e.summary()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Generate the incident report for {id}.

**Title**: {title}
**Severity**: {severity}
**Root cause**: {root_cause}
**Remediation**: {action}

## Timeline
{timeline}

Create a status update and postmortem.
Reply with a JSON object containing at least "postmortem".
"#,
        id = incident.id(),
        title = incident.title(),
        severity = severity_label(incident),
        root_cause = incident.root_cause(),
        action = incident.remediation_action(),
        timeline = timeline,
    )
}

fn severity_label(incident: &Incident) -> &'static str {
    incident.severity().map(|s| s.label()).unwrap_or("unknown")
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{Alert, Phase, Severity};
    use serde_json::json;

    fn incident() -> Incident {
        let mut incident = Incident::open(Alert::new("Checkout 5xx", Some("checkout"))).unwrap();
        incident.record(Phase::AlertReceived, "system", "Alert received: Checkout 5xx", Value::Null);
        incident
    }

    #[test]
    fn test_triage_prompt() {
        let incident = incident();
        let prompt = triage(&incident);
        assert!(prompt.contains(incident.id()));
        assert!(prompt.contains("Checkout 5xx"));
        assert!(prompt.contains("\"service\": \"checkout\""));
        assert!(prompt.contains("severity"));
    }

    #[test]
    fn test_diagnosis_prompt_carries_severity() {
        let mut incident = incident();
        incident.set_severity(Severity::High);
        let prompt = diagnosis(&incident, &json!({"severity": "P2-High", "services": ["checkout"]}));
        assert!(prompt.contains(incident.id()));
        assert!(prompt.contains("(P2-High)"));
        assert!(prompt.contains("\"services\":[\"checkout\"]"));
    }

    #[test]
    fn test_diagnosis_prompt_without_severity() {
        let incident = incident();
        assert!(diagnosis(&incident, &Value::Null).contains("(unknown)"));
    }

    #[test]
    fn test_remediation_prompt_carries_root_cause() {
        let mut incident = incident();
        incident.set_root_cause("TLS certificate expired");
        let prompt = remediation(&incident, &json!("cert expired at 03:00"));
        assert!(prompt.contains(incident.id()));
        assert!(prompt.contains("'TLS certificate expired'"));
        assert!(prompt.contains("cert expired at 03:00"));
    }

    #[test]
    fn test_communication_prompt_carries_everything() {
        let mut incident = incident();
        incident.set_severity(Severity::Critical);
        incident.set_root_cause("bad deploy");
        incident.set_remediation_action("rollback");
        let prompt = communication(&incident);
        assert!(prompt.contains(incident.id()));
        assert!(prompt.contains("**Severity**: P1-Critical"));
        assert!(prompt.contains("**Root cause**: bad deploy"));
        assert!(prompt.contains("**Remediation**: rollback"));
        assert!(prompt.contains("system: Alert received: Checkout 5xx"));
    }
}
