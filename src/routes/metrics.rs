use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the job metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("generation_jobs_total", "Total generation jobs submitted");
    metrics::describe_counter!("generation_jobs_completed", "Total generation jobs completed");
    metrics::describe_counter!("generation_jobs_failed", "Total generation jobs that failed");
    metrics::describe_gauge!(
        "generation_jobs_in_flight",
        "Jobs currently running inside the producer"
    );
    metrics::describe_histogram!(
        "generation_processing_seconds",
        "Time spent producing one artifact"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
