mod alert;
mod incident;
mod store;

pub use alert::Alert;
pub use incident::{Incident, IncidentError, IncidentSnapshot, Phase, Severity, TimelineEntry, TimelineEvent};
pub use store::IncidentStore;
