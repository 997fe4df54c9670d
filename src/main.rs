mod agent;
mod incident;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agent::{CommandDispatcher, OrchestratorConfig, PhaseOrchestrator, ScriptedDispatcher};
use incident::{Alert, Incident, IncidentSnapshot, IncidentStore};

#[derive(Parser)]
#[command(
    name = "incident-commander",
    version,
    about = "Incident response pipeline: triage, diagnosis, remediation, communication"
)]
struct Cli {
    /// Home directory for config, agent logs and stored incidents
    #[arg(long, global = true, default_value = ".incident-commander")]
    home: PathBuf,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an alert through the pipeline using the configured agent commands
    Run {
        /// Alert payload as a JSON file, `-` for stdin
        #[arg(long, conflicts_with_all = ["title", "service"])]
        alert: Option<PathBuf>,
        /// Alert title
        #[arg(long)]
        title: Option<String>,
        /// Affected service
        #[arg(long)]
        service: Option<String>,
        /// Do not store the resulting incident
        #[arg(long)]
        no_store: bool,
    },
    /// Run the sample payment-service alert against scripted agents
    Demo {
        /// Print the task sent to each agent
        #[arg(long)]
        show_prompts: bool,
        /// Do not store the resulting incident
        #[arg(long)]
        no_store: bool,
    },
    /// List configured agents
    Agents,
    /// Validate configuration and agent commands
    Check,
    /// List stored incidents
    List,
    /// Show a stored incident
    Show {
        id: String,
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            alert,
            title,
            service,
            no_store,
        } => {
            let payload = match (alert, title) {
                (Some(path), _) => read_alert(&path)?,
                (None, Some(title)) => Alert::new(title, service.as_deref()).into_value(),
                (None, None) => bail!("Provide an alert with --alert FILE or --title TITLE"),
            };
            let config = OrchestratorConfig::load(&cli.home)?;
            let dispatcher = CommandDispatcher::new(config.catalog.clone(), cli.home.clone())
                .with_timeout(config.dispatch_timeout());
            let orchestrator = PhaseOrchestrator::new(Arc::new(dispatcher), config.catalog)?;

            let incident = orchestrator.handle_alert(payload).await?;
            report(&incident, &cli.home, no_store)?;
        }
        Command::Demo {
            show_prompts,
            no_store,
        } => {
            let config = OrchestratorConfig::load(&cli.home)?;
            let dispatcher = Arc::new(ScriptedDispatcher::demo(&config.catalog));
            let orchestrator = PhaseOrchestrator::new(dispatcher.clone(), config.catalog)?;

            let incident = orchestrator.handle_alert(Alert::sample().into_value()).await?;
            if show_prompts {
                for call in dispatcher.calls() {
                    println!("── {} → {}", call.task_id, call.agent_name);
                    println!("{}", call.message);
                }
            }
            report(&incident, &cli.home, no_store)?;
        }
        Command::Agents => {
            let config = OrchestratorConfig::load(&cli.home)?;
            println!("{:<14} {:<28} {:<20} TOOLS", "ROLE", "AGENT ID", "NAME");
            for (role, spec) in config.catalog.agents() {
                println!(
                    "{:<14} {:<28} {:<20} {}",
                    role.as_str(),
                    spec.agent_id,
                    spec.name,
                    spec.tools.join(", ")
                );
                if !spec.description.is_empty() {
                    println!("{:<14} {}", "", spec.description);
                }
            }
        }
        Command::Check => check(&cli.home)?,
        Command::List => {
            let store = IncidentStore::new(&cli.home)?;
            let incidents = store.load()?;
            if incidents.is_empty() {
                println!("No incidents stored in {}", store.home().display());
            }
            for snapshot in incidents {
                println!(
                    "{:<30} {:<12} {:<14} {:>8}  {}",
                    snapshot.id,
                    snapshot.severity.map(|s| s.label()).unwrap_or("-"),
                    snapshot.phase.display_name(),
                    format_mttr(snapshot.mttr_seconds),
                    snapshot.title
                );
            }
        }
        Command::Show { id, json } => {
            let store = IncidentStore::new(&cli.home)?;
            let snapshot = store
                .get(&id)?
                .with_context(|| format!("Incident not found: {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }
    }

    Ok(())
}

fn read_alert(path: &Path) -> Result<Value> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read alert from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alert: {}", path.display()))?
    };
    serde_json::from_str(&content).context("Alert is not valid JSON")
}

/// Print the finished incident and store its snapshot
fn report(incident: &Incident, home: &Path, no_store: bool) -> Result<()> {
    for event in incident.timeline() {
        debug!(phase = %event.phase(), details = %event.details(), "timeline detail");
    }

    let snapshot = incident.snapshot();
    print_snapshot(&snapshot);
    if !incident.postmortem().is_empty() {
        println!("\nPostmortem:\n{}", incident.postmortem());
    }

    if !no_store {
        let store = IncidentStore::new(home)?;
        store.add(snapshot)?;
        println!("\nStored in {}", store.home().display());
    }
    Ok(())
}

fn print_snapshot(snapshot: &IncidentSnapshot) {
    println!("{}: {}", snapshot.id, snapshot.title);
    println!(
        "  Severity:    {}",
        snapshot.severity.map(|s| s.label()).unwrap_or("-")
    );
    println!("  Phase:       {}", snapshot.phase);
    println!("  Root cause:  {}", snapshot.root_cause);
    println!("  Remediation: {}", snapshot.remediation_action);
    println!("  MTTR:        {}", format_mttr(snapshot.mttr_seconds));
    println!("\nTimeline:");
    for entry in &snapshot.timeline {
        println!(
            "  [{}] {:<14} {:<20} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.phase.display_name(),
            entry.agent,
            entry.summary
        );
    }
}

fn format_mttr(mttr_seconds: Option<f64>) -> String {
    match mttr_seconds {
        Some(secs) => format!("{:.1}s", secs),
        None => "-".into(),
    }
}

fn check(home: &Path) -> Result<()> {
    let config = OrchestratorConfig::load(home)?;
    config.catalog.validate()?;
    println!("✓ Catalog covers all roles");

    let mut missing = Vec::new();
    for (role, spec) in config.catalog.agents() {
        if command_available(&spec.command) {
            println!("✓ {:<14} {} ({})", role.as_str(), spec.agent_id, spec.command);
        } else {
            println!("✗ {:<14} {} ({} not found)", role.as_str(), spec.agent_id, spec.command);
            missing.push(spec.command.clone());
        }
    }
    match config.dispatch_timeout_secs {
        Some(secs) => println!("  Dispatch timeout: {}s", secs),
        None => println!("  Dispatch timeout: none"),
    }

    if !missing.is_empty() {
        bail!("Agent commands not found: {}", missing.join(", "));
    }
    Ok(())
}

fn command_available(command: &str) -> bool {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Severity;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "incident-commander",
            "run",
            "--title",
            "Disk full",
            "--service",
            "db",
        ])
        .unwrap();
        match cli.command {
            Command::Run { title, service, alert, no_store } => {
                assert_eq!(title.as_deref(), Some("Disk full"));
                assert_eq!(service.as_deref(), Some("db"));
                assert!(alert.is_none());
                assert!(!no_store);
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.home, PathBuf::from(".incident-commander"));
    }

    #[test]
    fn test_cli_alert_conflicts_with_title() {
        let result = Cli::try_parse_from([
            "incident-commander",
            "run",
            "--alert",
            "alert.json",
            "--title",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_show() {
        let cli = Cli::try_parse_from(["incident-commander", "--home", "/tmp/ic", "show", "INC-1", "--json"]).unwrap();
        assert_eq!(cli.home, PathBuf::from("/tmp/ic"));
        assert!(matches!(cli.command, Command::Show { ref id, json: true } if id == "INC-1"));
    }

    #[test]
    fn test_read_alert_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert.json");
        std::fs::write(&path, r#"{"title": "Queue backlog"}"#).unwrap();
        let value = read_alert(&path).unwrap();
        assert_eq!(value["title"], "Queue backlog");

        std::fs::write(&path, "nope").unwrap();
        assert!(read_alert(&path).is_err());
    }

    #[test]
    fn test_format_mttr() {
        assert_eq!(format_mttr(Some(12.345)), "12.3s");
        assert_eq!(format_mttr(None), "-");
    }

    #[test]
    fn test_command_available() {
        assert!(!command_available("definitely-not-an-installed-agent"));
        assert!(!command_available("/nonexistent/bin/agent"));
    }

    #[tokio::test]
    async fn test_demo_pipeline_end_to_end() {
        let config = OrchestratorConfig::default();
        let dispatcher = Arc::new(ScriptedDispatcher::demo(&config.catalog));
        let orchestrator = PhaseOrchestrator::new(dispatcher, config.catalog).unwrap();

        let incident = orchestrator.handle_alert(Alert::sample().into_value()).await.unwrap();
        assert_eq!(incident.severity(), Some(Severity::Critical));
        assert!(incident.root_cause().starts_with("DB connection pool exhausted"));
        assert_eq!(incident.remediation_action(), "rollback payment-service to v2.13.2");
        assert!(incident.postmortem().starts_with("Postmortem:"));

        let dir = tempfile::tempdir().unwrap();
        report(&incident, dir.path(), false).unwrap();
        let stored = IncidentStore::new(dir.path()).unwrap().get(incident.id()).unwrap();
        assert!(stored.is_some());
    }
}
