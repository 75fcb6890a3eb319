// tests/metrics.rs
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use autopattern::hitl::HumanLoop;
use autopattern::synth::{plan_or_fallback, GenerationError};
use autopattern::telemetry::Metrics;

// The recorder is process-global, so everything lives in one test.
#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_series() {
    let metrics = Metrics::init().expect("install recorder");

    let plan = plan_or_fallback(Err(GenerationError::EmptyResponse), &["Pressed Enter".into()]);
    assert_eq!(plan.steps.len(), 1);
    // no operator connected: answered with the default immediately
    HumanLoop::new(Duration::from_secs(1)).ask("Proceed?").await;

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in ["synth_fallback_total", "human_loop_questions_total"] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
