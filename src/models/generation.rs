use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

/// Fully resolved parameters for one video generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct GenerationSpec {
    #[garde(custom(non_blank))]
    pub prompt: String,

    #[garde(range(min = 1, max = 4096))]
    pub video_width: u32,

    #[garde(range(min = 1, max = 4096))]
    pub video_height: u32,

    /// Length in frames.
    #[garde(range(min = 1, max = 1024))]
    pub video_length: u32,

    #[garde(range(min = 1, max = 500))]
    pub infer_steps: u32,

    #[garde(range(min = 0.0, max = 50.0))]
    pub cfg_scale: f64,

    /// Absent means the producer picks one.
    #[garde(skip)]
    pub seed: Option<u64>,
}

fn non_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("prompt must not be empty"));
    }
    Ok(())
}

impl GenerationSpec {
    /// A spec with default parameters for `prompt`.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        GenerateRequest {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
        .resolve(&GenerationDefaults::default())
    }
}

/// Parameters applied to any field a request leaves out.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationDefaults {
    pub video_width: u32,
    pub video_height: u32,
    pub video_length: u32,
    pub infer_steps: u32,
    pub cfg_scale: f64,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            video_width: 1280,
            video_height: 720,
            video_length: 129,
            infer_steps: 50,
            cfg_scale: 6.0,
        }
    }
}

/// Body of `POST /api/v1/jobs`. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_length: Option<u32>,
    pub infer_steps: Option<u32>,
    pub cfg_scale: Option<f64>,
    pub seed: Option<u64>,
}

impl GenerateRequest {
    /// Fill missing fields from `defaults`. A missing prompt becomes empty and
    /// is rejected by validation.
    pub fn resolve(self, defaults: &GenerationDefaults) -> GenerationSpec {
        GenerationSpec {
            prompt: self.prompt.unwrap_or_default(),
            video_width: self.video_width.unwrap_or(defaults.video_width),
            video_height: self.video_height.unwrap_or(defaults.video_height),
            video_length: self.video_length.unwrap_or(defaults.video_length),
            infer_steps: self.infer_steps.unwrap_or(defaults.infer_steps),
            cfg_scale: self.cfg_scale.unwrap_or(defaults.cfg_scale),
            seed: self.seed,
        }
    }
}

/// Response after submitting a generation job.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// External view of a job. The artifact's filesystem location stays internal;
/// clients get a download URL instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub prompt: String,
    pub video_width: u32,
    pub video_height: u32,
    pub video_length: u32,
    pub infer_steps: u32,
    pub cfg_scale: f64,
    pub seed: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub generation_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let download_url = (job.status == JobStatus::Completed)
            .then(|| format!("/api/v1/jobs/{}/download", job.id));

        Self {
            job_id: job.id,
            status: job.status,
            prompt: job.spec.prompt.clone(),
            video_width: job.spec.video_width,
            video_height: job.spec.video_height,
            video_length: job.spec.video_length,
            infer_steps: job.spec.infer_steps,
            cfg_scale: job.spec.cfg_scale,
            seed: job.resolved_seed.or(job.spec.seed),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            generation_seconds: job.generation_seconds(),
            download_url,
            error: job.error_detail.clone(),
        }
    }
}

/// Response for `GET /api/v1/jobs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobView>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub pages: u64,
}
