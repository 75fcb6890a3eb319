// src/config/mod.rs
pub mod settings;

use std::env;
use std::time::Duration;

use crate::synth::{DescriptionFallback, GenerationError};

pub const DEFAULT_LLM_ENDPOINT: &str = "https://models.github.ai/inference/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_AGENT_COMMAND: &str = "browser-agent";
pub const DEFAULT_AUTOMATION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_HUMAN_LOOP_TIMEOUT_SECS: u64 = 120;

/// Process-level configuration read once from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub analysis_model: String,
    pub headless: bool,
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub description_fallback: DescriptionFallback,
    pub automation_timeout: Duration,
    pub human_loop_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            llm_endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            analysis_model: DEFAULT_LLM_MODEL.to_string(),
            headless: false,
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
            agent_args: Vec::new(),
            description_fallback: DescriptionFallback::Raise,
            automation_timeout: Duration::from_secs(DEFAULT_AUTOMATION_TIMEOUT_SECS),
            human_loop_timeout: Duration::from_secs(DEFAULT_HUMAN_LOOP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let llm_model = non_empty_var("LLM_MODEL").unwrap_or(d.llm_model);
        Self {
            api_key: non_empty_var("LLM_API_KEY")
                .or_else(|| non_empty_var("GITHUB_PAT"))
                .unwrap_or_default(),
            llm_endpoint: non_empty_var("LLM_ENDPOINT").unwrap_or(d.llm_endpoint),
            analysis_model: non_empty_var("ANALYSIS_MODEL").unwrap_or_else(|| llm_model.clone()),
            llm_model,
            headless: non_empty_var("HEADLESS").is_some_and(|v| parse_bool(&v)),
            agent_command: non_empty_var("AGENT_COMMAND").unwrap_or(d.agent_command),
            agent_args: non_empty_var("AGENT_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            description_fallback: non_empty_var("DESCRIPTION_FALLBACK")
                .map(|v| DescriptionFallback::parse(&v))
                .unwrap_or_default(),
            automation_timeout: secs_var("AUTOMATION_TIMEOUT_SECS")
                .unwrap_or(d.automation_timeout),
            human_loop_timeout: secs_var("HUMAN_LOOP_TIMEOUT_SECS")
                .unwrap_or(d.human_loop_timeout),
        }
    }

    /// Fails fast when no LLM credential is configured.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredential);
        }
        Ok(())
    }
}

pub(crate) fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn secs_var(name: &str) -> Option<Duration> {
    non_empty_var(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}
