use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{AgentCatalog, DispatchError, DispatchResult, TaskDispatcher};

/// Lines of stderr kept in a failure message
const STDERR_TAIL_LINES: usize = 5;

/// Dispatches tasks by running each agent's command
///
/// The message is appended as the last argument and the task id is exported
/// as `INCIDENT_TASK_ID`. Output is appended to `logs/<task_id>.log`.
pub struct CommandDispatcher {
    catalog: AgentCatalog,
    log_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandDispatcher {
    pub fn new(catalog: AgentCatalog, home: PathBuf) -> Self {
        let log_dir = home.join("logs");
        std::fs::create_dir_all(&log_dir).ok();

        Self {
            catalog,
            log_dir,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn append_log(&self, task_id: &str, agent_name: &str, stdout: &str, stderr: &str) {
        let log_path = self.log_dir.join(format!("{}.log", task_id));
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await;
        if let Ok(mut file) = file {
            let mut entry = format!("# agent: {}\n{}\n", agent_name, stdout);
            for line in stderr.lines() {
                entry.push_str(&format!("[stderr] {}\n", line));
            }
            let _ = file.write_all(entry.as_bytes()).await;
        }
    }
}

#[async_trait]
impl TaskDispatcher for CommandDispatcher {
    async fn dispatch(
        &self,
        task_id: &str,
        agent_name: &str,
        message: &str,
    ) -> Result<DispatchResult, DispatchError> {
        let spec = self
            .catalog
            .find_by_id(agent_name)
            .ok_or_else(|| DispatchError::UnknownAgent(agent_name.to_string()))?;

        let mut args = spec.args.clone();
        args.push(message.to_string());

        debug!(task_id, agent = agent_name, command = %spec.command, "spawning agent");
        let child = Command::new(&spec.command)
            .args(&args)
            .env("INCIDENT_TASK_ID", task_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DispatchError::Spawn {
                agent: agent_name.to_string(),
                reason: e.to_string(),
            })?;

        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                DispatchError::Timeout {
                    agent: agent_name.to_string(),
                    secs: limit.as_secs(),
                }
            })?,
            None => wait.await,
        }
        .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        self.append_log(task_id, agent_name, &stdout, &stderr).await;

        if !output.status.success() {
            return Err(DispatchError::Failed {
                agent: agent_name.to_string(),
                code: output.status.code(),
                stderr: stderr_tail(&stderr),
            });
        }
        if stdout.trim().is_empty() {
            return Err(DispatchError::EmptyOutput(agent_name.to_string()));
        }

        Ok(DispatchResult::from_output(&stdout))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agent::{AgentRole, AgentSpec};
    use tempfile::TempDir;

    fn sh_agent(script: &str) -> AgentSpec {
        AgentSpec {
            agent_id: "incident_cmd_triage".into(),
            name: "Triage Agent".into(),
            command: "sh".into(),
            // the message lands in $1 after the script name
            args: vec!["-c".into(), script.into(), "agent".into()],
            description: String::new(),
            tools: vec![],
        }
    }

    fn dispatcher(script: &str, dir: &TempDir) -> CommandDispatcher {
        let catalog = AgentCatalog::from_specs([(AgentRole::Triage, sh_agent(script))]);
        CommandDispatcher::new(catalog, dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_structured_output() {
        let dir = TempDir::new().unwrap();
        let runner = dispatcher(r#"echo '{"severity": "P2-High"}'"#, &dir);

        let result = runner
            .dispatch("INC-1-triage", "incident_cmd_triage", "classify")
            .await
            .unwrap();
        assert_eq!(result, DispatchResult::from(serde_json::json!({"severity": "P2-High"})));
        assert!(dir.path().join("logs").join("INC-1-triage.log").exists());
    }

    #[tokio::test]
    async fn test_message_and_task_id_are_passed() {
        let dir = TempDir::new().unwrap();
        let runner = dispatcher(r#"echo "$INCIDENT_TASK_ID: $1""#, &dir);

        let result = runner
            .dispatch("INC-2-triage", "incident_cmd_triage", "hello agent")
            .await
            .unwrap();
        assert_eq!(result, DispatchResult::FreeText("INC-2-triage: hello agent".into()));
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let dir = TempDir::new().unwrap();
        let runner = dispatcher("echo ok", &dir);
        let err = runner.dispatch("t", "nobody", "m").await.unwrap_err();
        assert_eq!(err, DispatchError::UnknownAgent("nobody".into()));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let dir = TempDir::new().unwrap();
        let runner = dispatcher("echo boom >&2; exit 3", &dir);
        let err = runner.dispatch("t", "incident_cmd_triage", "m").await.unwrap_err();
        match err {
            DispatchError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_output() {
        let dir = TempDir::new().unwrap();
        let runner = dispatcher("true", &dir);
        let err = runner.dispatch("t", "incident_cmd_triage", "m").await.unwrap_err();
        assert!(matches!(err, DispatchError::EmptyOutput(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let runner = dispatcher("sleep 5", &dir).with_timeout(Some(Duration::from_millis(100)));
        let err = runner.dispatch("t", "incident_cmd_triage", "m").await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let dir = TempDir::new().unwrap();
        let mut spec = sh_agent("");
        spec.command = "definitely-not-an-installed-agent".into();
        let catalog = AgentCatalog::from_specs([(AgentRole::Triage, spec)]);
        let runner = CommandDispatcher::new(catalog, dir.path().to_path_buf());

        let err = runner.dispatch("t", "incident_cmd_triage", "m").await.unwrap_err();
        assert!(matches!(err, DispatchError::Spawn { .. }));
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = (1..=8).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        assert_eq!(stderr_tail(&stderr), "line 4\nline 5\nline 6\nline 7\nline 8");
    }
}
