use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::routes::error::{ApiError, ApiResult};
use crate::services::producer::ProducerStatus;
use crate::services::store::JobStore;

#[derive(Serialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub message: String,
}

/// GET /api/v1/producer — Model status.
pub async fn producer_status<S: JobStore>(State(state): State<AppState<S>>) -> Json<ProducerStatus> {
    Json(state.producer.status())
}

/// POST /api/v1/producer/initialize — Load the model now rather than on the first job.
pub async fn initialize_producer<S: JobStore>(
    State(state): State<AppState<S>>,
) -> ApiResult<Json<InitializeResponse>> {
    let producer = state.producer.clone();
    let success = tokio::task::spawn_blocking(move || producer.initialize())
        .await
        .map_err(|e| ApiError::Internal(format!("initialization task failed: {e}")))?;

    let message = if success {
        "Model initialized"
    } else {
        "Model initialization failed"
    };

    Ok(Json(InitializeResponse {
        success,
        message: message.to_string(),
    }))
}
