// src/synth/mod.rs
//! Description synthesizer: workflow summary → free-text task or structured plan.
//!
//! Free-text failures follow the configured `DescriptionFallback`; plan
//! generation never fails and degrades to a plan built from the raw events.

pub mod llm;
pub mod plan;
pub mod prompt;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use llm::{build_chat_model, ChatModel, ChatRequest, DynChatModel, MockChatModel};
pub use plan::{fallback_plan, parse_task_plan, plan_or_fallback, strip_code_fence, PlanStep, TaskPlan};

use crate::fingerprint;
use crate::workflow::Workflow;

/// Characters of the user prompt echoed by `DescriptionFallback::EchoPrompt`.
pub const ECHO_PROMPT_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM credential is missing; set LLM_API_KEY or GITHUB_PAT")]
    MissingCredential,
    #[error("LLM request failed: {0}")]
    Transport(String),
    #[error("LLM API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("no response generated from LLM")]
    EmptyResponse,
    #[error("could not decode LLM response: {0}")]
    Decode(String),
}

/// What free-text generation does when the model call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionFallback {
    /// Surface the `GenerationError` to the caller.
    #[default]
    Raise,
    /// Return a fixed instruction embedding the start of the prompt.
    EchoPrompt,
}

impl DescriptionFallback {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" | "echo" | "echo_prompt" | "fallback" => Self::EchoPrompt,
            _ => Self::Raise,
        }
    }
}

pub struct Synthesizer {
    model: DynChatModel,
    model_name: String,
    fallback: DescriptionFallback,
}

impl Synthesizer {
    pub fn new(model: DynChatModel, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            fallback: DescriptionFallback::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: DescriptionFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Free-text task description for a workflow.
    pub async fn generate_task_description(
        &self,
        workflow: &Workflow,
    ) -> Result<String, GenerationError> {
        self.generate_from_summary(&workflow.summary(), workflow.start_url())
            .await
    }

    /// Free-text task description from a plain summary.
    pub async fn generate_from_summary(
        &self,
        summary: &str,
        start_url: &str,
    ) -> Result<String, GenerationError> {
        counter!("synth_requests_total", "mode" => "text").increment(1);
        let user = prompt::task_user_prompt(start_url, summary);
        let req = ChatRequest::new(&self.model_name, prompt::TASK_SYSTEM_PROMPT, user);
        info!(
            provider = self.model.provider_name(),
            model = %self.model_name,
            prompt_id = %fingerprint(&req.user),
            "generating task description"
        );

        let result = self
            .model
            .complete(&req)
            .await
            .map(|text| text.trim().to_string())
            .and_then(|text| {
                if text.is_empty() {
                    Err(GenerationError::EmptyResponse)
                } else {
                    Ok(text)
                }
            });

        match (result, self.fallback) {
            (Ok(text), _) => {
                debug!(task = %text, "task description generated");
                Ok(text)
            }
            (Err(e), DescriptionFallback::Raise) => Err(e),
            (Err(e), DescriptionFallback::EchoPrompt) => {
                warn!(error = %e, "task generation failed; echoing prompt");
                counter!("synth_fallback_total", "mode" => "text").increment(1);
                Ok(echo_prompt_fallback(&req.user))
            }
        }
    }

    /// Structured `{title, description, steps}` plan. Never fails.
    pub async fn generate_workflow_steps(&self, workflow: &Workflow) -> TaskPlan {
        counter!("synth_requests_total", "mode" => "plan").increment(1);
        let lines = prompt::detailed_event_lines(workflow);
        let req = ChatRequest::new(
            &self.model_name,
            prompt::PLAN_SYSTEM_PROMPT,
            prompt::plan_user_prompt(workflow, &lines),
        );
        info!(
            workflow_id = workflow.workflow_id(),
            events = lines.len(),
            model = %self.model_name,
            "generating workflow plan"
        );

        plan_or_fallback(self.model.complete(&req).await, &lines)
    }
}

/// Plan for a workflow; without a model the plan is built from the raw events.
pub async fn workflow_plan(synth: Option<&Synthesizer>, workflow: &Workflow) -> TaskPlan {
    match synth {
        Some(s) => s.generate_workflow_steps(workflow).await,
        None => {
            info!(workflow_id = workflow.workflow_id(), "no chat model; using fallback plan");
            fallback_plan(&prompt::detailed_event_lines(workflow))
        }
    }
}

/// Deterministic task text used when no model is configured.
pub fn summary_task(workflow: &Workflow) -> String {
    format!("Perform the following actions:\n{}", workflow.summary())
}

fn echo_prompt_fallback(user_prompt: &str) -> String {
    let prefix: String = user_prompt.chars().take(ECHO_PROMPT_CHARS).collect();
    format!("Perform the following task based on this recorded workflow:\n{prefix}")
}
