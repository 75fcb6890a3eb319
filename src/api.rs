// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::settings::{SettingsHandle, SettingsUpdate};
use crate::config::Config;
use crate::dispatch::{
    AgentSettings, AutomationResult, AutomationRunner, BrowserAgent, CommandAgent,
};
use crate::hitl::HumanLoop;
use crate::synth::{
    build_chat_model, summary_task, workflow_plan, DynChatModel, GenerationError, Synthesizer,
};
use crate::workflow::{normalize_value, Workflow};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: SettingsHandle,
    /// `None` when no LLM credential is configured.
    pub chat: Option<DynChatModel>,
    pub agent: Arc<dyn BrowserAgent>,
    pub human: HumanLoop,
}

impl AppState {
    pub fn new(
        config: Config,
        settings: SettingsHandle,
        chat: Option<DynChatModel>,
        agent: Arc<dyn BrowserAgent>,
    ) -> Self {
        let human = HumanLoop::new(config.human_loop_timeout);
        Self {
            config: Arc::new(config),
            settings,
            chat,
            agent,
            human,
        }
    }

    /// Production wiring: env config, settings file, HTTP chat client, agent process.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let settings = SettingsHandle::load(&config)?;
        let chat = build_chat_model(&config);
        if chat.is_none() {
            warn!("no LLM credential configured; descriptions fall back to raw summaries");
        }
        let agent = Arc::new(CommandAgent::new(
            config.agent_command.clone(),
            config.agent_args.clone(),
        ));
        Ok(Self::new(config, settings, chat, agent))
    }

    fn synthesizer(&self, chat: DynChatModel) -> Synthesizer {
        Synthesizer::new(chat, self.settings.snapshot().analysis_model)
            .with_fallback(self.config.description_fallback)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/generate-description", post(generate_description))
        .route("/api/workflow-steps", post(workflow_steps))
        .route("/automate-workflow", post(automate_workflow))
        .route("/ws/human-loop", get(human_loop_ws))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowReq {
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default, rename = "workflowId", alias = "workflow_id")]
    workflow_id: Option<Value>,
    #[serde(default)]
    start_url: Option<String>,
    #[serde(default)]
    task: Option<String>,
}

impl WorkflowReq {
    fn workflow(&self) -> Workflow {
        let id = match &self.workflow_id {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };
        Workflow::new(id, self.events.iter().map(normalize_value).collect())
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

fn no_events() -> Response {
    error_response(StatusCode::BAD_REQUEST, "No events provided")
}

async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "settings": state.settings.snapshot(),
        "available_models": state.settings.available_models(),
    }))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Json<Value> {
    let settings = state.settings.update(update);
    Json(json!({ "success": true, "settings": settings }))
}

async fn generate_description(
    State(state): State<AppState>,
    Json(body): Json<WorkflowReq>,
) -> Response {
    if body.events.is_empty() {
        return no_events();
    }
    let Some(chat) = state.chat.clone() else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            GenerationError::MissingCredential.to_string(),
        );
    };

    let workflow = body.workflow();
    let synth = state.synthesizer(chat);
    let result = match body.start_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => synth.generate_from_summary(&workflow.summary(), url).await,
        None => synth.generate_task_description(&workflow).await,
    };

    match result {
        Ok(task_description) => Json(json!({
            "success": true,
            "workflow_id": workflow.workflow_id(),
            "task_description": task_description,
        }))
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn workflow_steps(State(state): State<AppState>, Json(body): Json<WorkflowReq>) -> Response {
    if body.events.is_empty() {
        return no_events();
    }
    let workflow = body.workflow();
    let synth = state.chat.clone().map(|chat| state.synthesizer(chat));
    Json(workflow_plan(synth.as_ref(), &workflow).await).into_response()
}

async fn automate_workflow(
    State(state): State<AppState>,
    Json(body): Json<WorkflowReq>,
) -> Response {
    let task = match body.task.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => {
            if body.events.is_empty() {
                return no_events();
            }
            let workflow = body.workflow();
            match state.chat.clone() {
                Some(chat) => match state.synthesizer(chat).generate_task_description(&workflow).await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "task generation failed; using raw summary");
                        summary_task(&workflow)
                    }
                },
                None => summary_task(&workflow),
            }
        }
    };

    let settings = state.settings.snapshot();
    let mut runner = AutomationRunner::new(
        state.agent.clone(),
        AgentSettings {
            model: settings.llm_model.clone(),
            headless: settings.headless,
        },
    );
    if settings.enable_human_in_loop {
        runner = runner.with_human_loop(state.human.clone());
    }

    // own task so health/settings requests keep being served
    let limit = state.config.automation_timeout;
    let job_task = task.clone();
    let handle =
        tokio::spawn(async move { runner.run_task_with_timeout(&job_task, limit).await });
    let result = match handle.await {
        Ok(r) => r,
        Err(e) => AutomationResult::failed(&task, format!("automation task aborted: {e}")),
    };

    Json(json!({
        "success": result.success,
        "task_description": result.task,
        "error": result.error,
        "history": result.history,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    question_id: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

async fn human_loop_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.human))
}

async fn handle_socket(socket: WebSocket, human: HumanLoop) {
    let (mut sender, mut receiver) = socket.split();
    let mut questions = human.subscribe();
    info!("operator connected to human loop");

    loop {
        tokio::select! {
            q = questions.recv() => match q {
                Ok(q) => {
                    let msg = json!({
                        "type": "question",
                        "question_id": q.question_id,
                        "question": q.question,
                        "timestamp": q.timestamp,
                    });
                    if sender.send(Message::Text(msg.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "operator socket lagging behind questions");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(m) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                        warn!("failed to parse human loop message");
                        continue;
                    };
                    match m.kind.as_str() {
                        "answer" => {
                            let id = m.question_id.unwrap_or_default();
                            let accepted = human.answer(&id, m.answer.unwrap_or_default());
                            let ack = json!({ "type": "ack", "question_id": id, "accepted": accepted });
                            if sender.send(Message::Text(ack.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        "ping" => {
                            let pong = json!({ "type": "pong" });
                            if sender.send(Message::Text(pong.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        other => debug!(kind = other, "unhandled human loop message"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "human loop socket error");
                    break;
                }
            },
        }
    }
    info!("operator disconnected from human loop");
}
