mod catalog;
mod dispatcher;
mod extract;
mod orchestrator;
mod prompt;
mod runner;
mod scripted;

pub use catalog::{AgentCatalog, AgentRole, AgentSpec, CatalogError, OrchestratorConfig};
pub use dispatcher::{DispatchError, DispatchResult, TaskDispatcher};
pub use orchestrator::PhaseOrchestrator;
pub use runner::CommandDispatcher;
pub use scripted::ScriptedDispatcher;
