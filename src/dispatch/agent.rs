// src/dispatch/agent.rs
use serde::Serialize;
use serde_json::Value;

use super::AgentError;
use crate::hitl::HumanLoop;

/// Per-run agent configuration, taken from the settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSettings {
    pub model: String,
    pub headless: bool,
}

/// Something that can open a browser-backed agent session.
#[async_trait::async_trait]
pub trait BrowserAgent: Send + Sync {
    async fn launch(&self, settings: &AgentSettings) -> Result<Box<dyn BrowserSession>, AgentError>;
    fn name(&self) -> &'static str;
}

/// An acquired browser resource. `close` must be called on every path.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    /// Execute the task; returns an opaque execution history.
    async fn run(&mut self, task: &str, human: Option<&HumanLoop>) -> Result<Value, AgentError>;
    async fn close(&mut self) -> Result<(), AgentError>;
}
