// src/dispatch/mod.rs
//! Automation dispatcher: hands a task to the browser agent and converts every
//! outcome, including launch failures and timeouts, into an `AutomationResult`.

pub mod agent;
pub mod command;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

pub use agent::{AgentSettings, BrowserAgent, BrowserSession};
pub use command::CommandAgent;

use crate::fingerprint;
use crate::hitl::HumanLoop;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to launch browser agent: {0}")]
    Launch(String),
    #[error("automation failed: {0}")]
    Execution(String),
    #[error("failed to close browser agent: {0}")]
    Close(String),
    #[error("agent protocol error: {0}")]
    Protocol(String),
}

/// Outcome of one dispatch. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationResult {
    pub success: bool,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AutomationResult {
    pub fn completed(task: &str, history: Value) -> Self {
        Self {
            success: true,
            task: task.to_string(),
            history: Some(history),
            error: None,
        }
    }

    pub fn failed(task: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            task: task.to_string(),
            history: None,
            error: Some(error.into()),
        }
    }
}

pub struct AutomationRunner {
    agent: Arc<dyn BrowserAgent>,
    settings: AgentSettings,
    human: Option<HumanLoop>,
}

impl AutomationRunner {
    pub fn new(agent: Arc<dyn BrowserAgent>, settings: AgentSettings) -> Self {
        Self {
            agent,
            settings,
            human: None,
        }
    }

    /// Route agent questions to an operator.
    pub fn with_human_loop(mut self, human: HumanLoop) -> Self {
        self.human = Some(human);
        self
    }

    /// Run the task. The session is closed on success and failure alike.
    pub async fn run_task(&self, task: &str) -> AutomationResult {
        info!(
            agent = self.agent.name(),
            model = %self.settings.model,
            headless = self.settings.headless,
            task_id = %fingerprint(task),
            "starting automation task"
        );

        let mut session = match self.agent.launch(&self.settings).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "browser agent launch failed");
                counter!("automation_runs_total", "outcome" => "launch_failed").increment(1);
                return AutomationResult::failed(task, e.to_string());
            }
        };

        let outcome = session.run(task, self.human.as_ref()).await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "browser agent close failed");
        }

        match outcome {
            Ok(history) => {
                counter!("automation_runs_total", "outcome" => "success").increment(1);
                info!("automation finished");
                AutomationResult::completed(task, history)
            }
            Err(e) => {
                counter!("automation_runs_total", "outcome" => "failed").increment(1);
                error!(error = %e, "automation failed");
                AutomationResult::failed(task, e.to_string())
            }
        }
    }

    /// `run_task` bounded by a wall-clock limit; expiry counts as a failed dispatch.
    /// The in-flight session is dropped on expiry, which releases its resource.
    pub async fn run_task_with_timeout(&self, task: &str, limit: Duration) -> AutomationResult {
        match tokio::time::timeout(limit, self.run_task(task)).await {
            Ok(result) => result,
            Err(_) => {
                counter!("automation_runs_total", "outcome" => "timeout").increment(1);
                warn!(timeout_secs = limit.as_secs(), "automation timed out");
                AutomationResult::failed(
                    task,
                    format!("automation timed out after {}s", limit.as_secs()),
                )
            }
        }
    }
}
