use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::IncidentSnapshot;

/// Persists incident snapshots under the commander home directory
pub struct IncidentStore {
    home: PathBuf,
}

impl IncidentStore {
    /// Create the store, creating the home directory layout if needed
    pub fn new(home: impl Into<PathBuf>) -> Result<Self> {
        let home = home.into();

        if !home.exists() {
            fs::create_dir_all(&home)
                .with_context(|| format!("Failed to create {}", home.display()))?;
            fs::create_dir_all(home.join("logs")).context("Failed to create logs dir")?;
        }

        Ok(Self { home })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn incidents_file(&self) -> PathBuf {
        self.home.join("incidents.json")
    }

    /// Load all stored snapshots, oldest first
    pub fn load(&self) -> Result<Vec<IncidentSnapshot>> {
        let path = self.incidents_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).context("Failed to read incidents.json")?;
        let incidents: Vec<IncidentSnapshot> =
            serde_json::from_str(&content).context("Failed to parse incidents.json")?;
        Ok(incidents)
    }

    pub fn save(&self, incidents: &[IncidentSnapshot]) -> Result<()> {
        let content =
            serde_json::to_string_pretty(incidents).context("Failed to serialize incidents")?;
        fs::write(self.incidents_file(), content).context("Failed to write incidents.json")?;
        Ok(())
    }

    /// Append a snapshot, replacing any previous one with the same id
    pub fn add(&self, snapshot: IncidentSnapshot) -> Result<()> {
        let mut incidents = self.load()?;
        incidents.retain(|i| i.id != snapshot.id);
        incidents.push(snapshot);
        self.save(&incidents)
    }

    pub fn get(&self, incident_id: &str) -> Result<Option<IncidentSnapshot>> {
        let incidents = self.load()?;
        Ok(incidents.into_iter().find(|i| i.id == incident_id))
    }
}
