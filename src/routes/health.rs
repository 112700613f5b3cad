use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::job::StatusCounts;
use crate::services::store::JobStore;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<StatusCounts>,
    pub in_flight: usize,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: ComponentHealth,
    pub producer: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

/// GET /health — store and producer status plus job counts.
///
/// An uninitialized producer is reported but does not degrade health: the
/// first job loads it.
pub async fn health_check<S: JobStore>(
    State(state): State<AppState<S>>,
) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    let (store_check, jobs) = match state.jobs.stats().await {
        Ok(counts) => (
            ComponentHealth {
                status: "ok".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Some(counts),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Job store health check failed");
            (
                ComponentHealth {
                    status: "error".to_string(),
                    latency_ms: None,
                },
                None,
            )
        }
    };

    let producer = state.producer.status();
    let producer_check = ComponentHealth {
        status: match (producer.available, producer.initialized) {
            (false, _) => "unavailable",
            (true, false) => "not_initialized",
            (true, true) => "ok",
        }
        .to_string(),
        latency_ms: None,
    };

    let healthy = store_check.status == "ok" && producer.available;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            store: store_check,
            producer: producer_check,
        },
        jobs,
        in_flight: state.jobs.executor().in_flight(),
    };

    (status_code, Json(response))
}
