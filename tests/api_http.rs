// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use autopattern::config::settings::{Settings, SettingsHandle};
use autopattern::config::Config;
use autopattern::dispatch::{AgentError, AgentSettings, BrowserAgent, BrowserSession};
use autopattern::hitl::HumanLoop;
use autopattern::synth::{DynChatModel, MockChatModel};
use autopattern::{router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Default)]
struct Recorded {
    launches: AtomicUsize,
    last_task: Mutex<Option<String>>,
    last_settings: Mutex<Option<AgentSettings>>,
}

/// Records the task and settings it was launched with.
#[derive(Clone, Default)]
struct RecordingAgent(Arc<Recorded>);

struct RecordingSession(Arc<Recorded>);

#[async_trait::async_trait]
impl BrowserAgent for RecordingAgent {
    async fn launch(&self, s: &AgentSettings) -> Result<Box<dyn BrowserSession>, AgentError> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        *self.0.last_settings.lock().unwrap() = Some(s.clone());
        Ok(Box::new(RecordingSession(self.0.clone())))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[async_trait::async_trait]
impl BrowserSession for RecordingSession {
    async fn run(&mut self, task: &str, _h: Option<&HumanLoop>) -> Result<Json, AgentError> {
        *self.0.last_task.lock().unwrap() = Some(task.to_string());
        Ok(json!([{ "action": "done" }]))
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}

fn settings() -> SettingsHandle {
    SettingsHandle::new(
        Settings::from_config(&Config::default()),
        vec!["openai/gpt-4o".into(), "openai/gpt-4o-mini".into()],
    )
}

fn test_router(chat: Option<DynChatModel>) -> (Router, Arc<Recorded>) {
    let agent = RecordingAgent::default();
    let recorded = agent.0.clone();
    let state = AppState::new(Config::default(), settings(), chat, Arc::new(agent));
    (router(state), recorded)
}

fn mock(reply: &str) -> Option<DynChatModel> {
    Some(Arc::new(MockChatModel::new(reply)))
}

fn post(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn recorded_events() -> Json {
    json!([
        {"event": "click", "timestamp": 2, "data": {"element_type": "button", "text": "Submit"}},
        {"event": "navigation", "url": "https://x.com", "timestamp": 1}
    ])
}

#[tokio::test]
async fn health_returns_ok_status() {
    let (app, _) = test_router(None);
    let req = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn settings_can_be_read_and_partially_updated() {
    let (app, _) = test_router(None);

    let req = Request::builder()
        .uri("/api/settings")
        .body(Body::empty())
        .unwrap();
    let v = json_body(app.clone().oneshot(req).await.unwrap()).await;
    assert_eq!(v["settings"]["enable_human_in_loop"], false);
    assert_eq!(v["available_models"].as_array().unwrap().len(), 2);

    let req = Request::builder()
        .method("PUT")
        .uri("/api/settings")
        .header("content-type", "application/json")
        .body(Body::from(json!({"headless": true}).to_string()))
        .unwrap();
    let v = json_body(app.clone().oneshot(req).await.unwrap()).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["settings"]["headless"], true);
    assert_eq!(v["settings"]["llm_model"], Config::default().llm_model);
}

#[tokio::test]
async fn generate_description_returns_model_text() {
    let (app, _) = test_router(mock("Open x.com and click Submit."));
    let resp = app
        .oneshot(post(
            "/generate-description",
            json!({"events": recorded_events(), "workflowId": 7}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["workflow_id"], "7");
    assert_eq!(v["task_description"], "Open x.com and click Submit.");
}

#[tokio::test]
async fn generate_description_without_credential_is_500() {
    let (app, _) = test_router(None);
    let resp = app
        .oneshot(post("/generate-description", json!({"events": recorded_events()})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["success"], false);
}

#[tokio::test]
async fn empty_events_are_rejected() {
    for uri in ["/generate-description", "/api/workflow-steps", "/automate-workflow"] {
        let (app, _) = test_router(mock("unused"));
        let resp = app.oneshot(post(uri, json!({"events": []}))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            json_body(resp).await,
            json!({"success": false, "error": "No events provided"})
        );
    }
}

#[tokio::test]
async fn workflow_steps_without_model_uses_fallback_plan() {
    let (app, _) = test_router(None);
    let resp = app
        .oneshot(post("/api/workflow-steps", json!({"events": recorded_events()})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["title"], "Workflow");
    assert_eq!(v["steps"][0], json!({"id": 1, "label": "Navigated to https://x.com"}));
    assert_eq!(v["steps"][1]["label"], "Clicked button 'Submit'");
}

#[tokio::test]
async fn workflow_steps_with_model_parses_plan() {
    let reply = r#"{"title":"Submit the form","description":"Submit it.","steps":["Open x.com","Click Submit"]}"#;
    let (app, _) = test_router(mock(reply));
    let v = json_body(
        app.oneshot(post("/api/workflow-steps", json!({"events": recorded_events()})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(v["title"], "Submit the form");
    assert_eq!(v["steps"][1], json!({"id": 2, "label": "Click Submit"}));
}

#[tokio::test]
async fn automate_uses_generated_task_and_current_settings() {
    let (app, agent) = test_router(mock("Open x.com and click Submit."));
    let resp = app
        .oneshot(post("/automate-workflow", json!({"events": recorded_events()})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["task_description"], "Open x.com and click Submit.");
    assert!(v["error"].is_null());

    assert_eq!(agent.launches.load(Ordering::SeqCst), 1);
    assert_eq!(
        agent.last_task.lock().unwrap().as_deref(),
        Some("Open x.com and click Submit.")
    );
    let launched_with = agent.last_settings.lock().unwrap().clone().unwrap();
    assert_eq!(launched_with.model, Config::default().llm_model);
}

#[tokio::test]
async fn automate_explicit_task_skips_generation() {
    let (app, agent) = test_router(None);
    let v = json_body(
        app.oneshot(post("/automate-workflow", json!({"task": "  Log in  "})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(v["success"], true);
    assert_eq!(agent.last_task.lock().unwrap().as_deref(), Some("Log in"));
}

#[tokio::test]
async fn automate_without_model_dispatches_raw_summary() {
    let (app, agent) = test_router(None);
    let v = json_body(
        app.oneshot(post("/automate-workflow", json!({"events": recorded_events()})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(v["success"], true);
    let task = agent.last_task.lock().unwrap().clone().unwrap();
    assert!(task.starts_with("Perform the following actions:"));
    assert!(task.contains("1. Navigated to https://x.com"));
}
