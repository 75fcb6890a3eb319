// src/synth/llm.rs
//! Chat-completion client: provider abstraction + OpenAI-compatible provider
//! (GitHub Models by default) + deterministic mock.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::GenerationError;
use crate::config::Config;

pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// One system + user exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(model: &str, system: &str, user: String) -> Self {
        Self {
            model: model.to_string(),
            system: system.to_string(),
            user,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the first choice's message content.
    async fn complete(&self, req: &ChatRequest) -> Result<String, GenerationError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynChatModel = Arc<dyn ChatModel>;

/// Factory: `AI_TEST_MODE=mock` yields the mock; a missing credential yields `None`.
pub fn build_chat_model(config: &Config) -> Option<DynChatModel> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Some(Arc::new(MockChatModel::new(
            "Go to the recorded start page and repeat the recorded actions (mock)",
        )));
    }
    if config.validate().is_err() {
        return None;
    }
    match OpenAiCompatibleClient::new(&config.llm_endpoint, &config.api_key) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build chat client");
            None
        }
    }
}

/// Chat Completions over HTTP with Bearer auth.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("autopattern/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(&self, req: &ChatRequest) -> Result<String, GenerationError> {
        let body = Req {
            model: &req.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.system,
                },
                Msg {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        debug!(model = %req.model, choices = parsed.choices.len(), "chat completion received");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GenerationError::EmptyResponse)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Returns a fixed reply; records nothing.
#[derive(Debug, Clone)]
pub struct MockChatModel {
    pub fixed: String,
}

impl MockChatModel {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, _req: &ChatRequest) -> Result<String, GenerationError> {
        Ok(self.fixed.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
