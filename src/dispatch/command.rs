// src/dispatch/command.rs
//! Browser agent hosted in an external process speaking JSON lines.
//!
//! stdin  <- `{"type":"task","task":..,"model":..,"headless":..}` then answers
//! stdout -> `{"type":"step",..}` | `{"type":"question",..}` | `{"type":"done",..}`

use std::process::Stdio;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::agent::{AgentSettings, BrowserAgent, BrowserSession};
use super::AgentError;
use crate::hitl::HumanLoop;

pub const HUMAN_LOOP_DISABLED_ANSWER: &str =
    "Human assistance is disabled. Continue with your best judgment.";

#[derive(Debug, Clone)]
pub struct CommandAgent {
    program: String,
    args: Vec<String>,
}

impl CommandAgent {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait::async_trait]
impl BrowserAgent for CommandAgent {
    async fn launch(&self, settings: &AgentSettings) -> Result<Box<dyn BrowserSession>, AgentError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("AGENT_MODEL", &settings.model)
            .env("AGENT_HEADLESS", if settings.headless { "true" } else { "false" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Launch(format!("{}: {e}", self.program)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Launch("agent stdout unavailable".into()))?;
        info!(program = %self.program, pid = ?child.id(), "agent process started");

        Ok(Box::new(CommandSession {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            settings: settings.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentMessage {
    Step {
        #[serde(flatten)]
        detail: Map<String, Value>,
    },
    Question {
        #[serde(default)]
        question_id: Option<String>,
        question: String,
    },
    Done {
        #[serde(default)]
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

struct CommandSession {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    settings: AgentSettings,
}

impl CommandSession {
    async fn send(&mut self, msg: &Value) -> Result<(), AgentError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AgentError::Protocol("agent stdin closed".into()))?;
        let mut line = msg.to_string();
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Protocol(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| AgentError::Protocol(e.to_string()))
    }
}

#[async_trait::async_trait]
impl BrowserSession for CommandSession {
    async fn run(&mut self, task: &str, human: Option<&HumanLoop>) -> Result<Value, AgentError> {
        let job = json!({
            "type": "task",
            "task": task,
            "model": self.settings.model,
            "headless": self.settings.headless,
        });
        self.send(&job).await?;

        let mut history = Vec::new();
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| AgentError::Protocol(e.to_string()))?;
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AgentMessage>(&line) {
                Ok(AgentMessage::Step { detail }) => {
                    debug!(step = history.len() + 1, "agent step");
                    history.push(Value::Object(detail));
                }
                Ok(AgentMessage::Question {
                    question_id,
                    question,
                }) => {
                    let answer = match human {
                        Some(h) => h.ask(&question).await,
                        None => HUMAN_LOOP_DISABLED_ANSWER.to_string(),
                    };
                    self.send(&json!({
                        "type": "answer",
                        "question_id": question_id,
                        "answer": answer,
                    }))
                    .await?;
                }
                Ok(AgentMessage::Done { success, error }) => {
                    info!(success, steps = history.len(), "agent finished");
                    return if success {
                        Ok(Value::Array(history))
                    } else {
                        Err(AgentError::Execution(
                            error.unwrap_or_else(|| "agent reported failure".to_string()),
                        ))
                    };
                }
                Err(_) => debug!(%line, "agent output"),
            }
        }

        // stdout closed without a `done` message
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| AgentError::Protocol(e.to_string()))?;
        if status.success() {
            Ok(Value::Array(history))
        } else {
            Err(AgentError::Execution(format!("agent exited with {status}")))
        }
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.stdin.take();
        match self.child.try_wait() {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                warn!(pid = ?self.child.id(), "agent still running; killing");
                self.child
                    .kill()
                    .await
                    .map_err(|e| AgentError::Close(e.to_string()))
            }
            Err(e) => Err(AgentError::Close(e.to_string())),
        }
    }
}
