use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the pipeline series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!("synth_requests_total", "Synthesizer calls by mode (text|plan).");
        describe_counter!(
            "synth_fallback_total",
            "Synthesizer calls answered by a fallback instead of the model."
        );
        describe_counter!("automation_runs_total", "Dispatches by outcome.");
        describe_counter!("human_loop_questions_total", "Questions routed to operators.");
        describe_counter!(
            "human_loop_timeouts_total",
            "Operator questions answered by the default after timeout."
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
