use axum::body::Body;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::generation::{GenerateRequest, JobListResponse, JobView, SubmitResponse};
use crate::routes::error::{ApiError, ApiResult};
use crate::services::jobs::JobError;
use crate::services::store::JobStore;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

fn parse_job_id(job_id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    job_id
        .map(|Path(id)| id)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /api/v1/jobs — Submit a video generation job.
pub async fn submit_job<S: JobStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) = payload
        .map_err(|rejection| JobError::InvalidSpecification(rejection.body_text()))?;

    let job = state.jobs.submit(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            job_id: job.id,
            status: job.status,
            message: "Generation job accepted".to_string(),
        }),
    ))
}

/// GET /api/v1/jobs — List jobs, newest first.
pub async fn list_jobs<S: JobStore>(
    State(state): State<AppState<S>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<JobListResponse>> {
    let Query(params) = params.map_err(|rejection| ApiError::InvalidQuery(rejection.body_text()))?;
    let page = state
        .jobs
        .list_jobs(params.page.unwrap_or(1), params.per_page.unwrap_or(10))
        .await?;

    Ok(Json(JobListResponse {
        jobs: page.items,
        total: page.total,
        page: page.page,
        per_page: page.page_size,
        pages: page.pages,
    }))
}

/// GET /api/v1/jobs/{job_id} — Check job status.
pub async fn get_job<S: JobStore>(
    State(state): State<AppState<S>>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<JobView>> {
    let job_id = parse_job_id(job_id)?;
    Ok(Json(state.jobs.get_status(job_id).await?))
}

/// DELETE /api/v1/jobs/{job_id} — Purge a finished job and its artifact.
pub async fn purge_job<S: JobStore>(
    State(state): State<AppState<S>>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let job_id = parse_job_id(job_id)?;
    state.jobs.purge(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/jobs/{job_id}/download — Stream the generated video.
pub async fn download_artifact<S: JobStore>(
    State(state): State<AppState<S>>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Response> {
    let job_id = parse_job_id(job_id)?;
    let artifact = state.jobs.fetch_artifact(job_id).await?;

    let content_type = if artifact.file_name.ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    };

    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_LENGTH, artifact.len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(artifact.file))).into_response())
}
