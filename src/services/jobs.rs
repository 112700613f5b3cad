use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use garde::Validate;
use tokio::fs::File;
use uuid::Uuid;

use crate::models::generation::{GenerateRequest, GenerationDefaults, JobView};
use crate::models::job::{Job, JobStatus, StatusCounts};
use crate::services::executor::JobExecutor;
use crate::services::store::{JobStore, StoreError};

/// Largest page a single listing may request.
pub const MAX_PAGE_SIZE: u64 = 100;

const DEFAULT_ARTIFACT_EXTENSION: &str = "mp4";

/// Public entry point for submitting, querying and downloading jobs.
pub struct JobService<S> {
    store: Arc<S>,
    executor: Arc<dyn JobExecutor>,
    defaults: GenerationDefaults,
    artifact_prefix: String,
}

/// One page of a job listing.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub items: Vec<JobView>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub pages: u64,
}

/// A completed job's artifact, opened and ready to stream.
#[derive(Debug)]
pub struct Artifact {
    pub file: File,
    pub len: u64,
    pub file_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    #[error("Invalid pagination: page={page}, page_size={page_size}")]
    InvalidPagination { page: i64, page_size: i64 },

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} is not ready (status: {status})")]
    NotReady { id: Uuid, status: JobStatus },

    #[error("Artifact for job {0} is no longer available")]
    ArtifactMissing(Uuid),

    #[error("Job {0} is still in progress")]
    JobActive(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<S: JobStore> JobService<S> {
    pub fn new(
        store: Arc<S>,
        executor: Arc<dyn JobExecutor>,
        defaults: GenerationDefaults,
        artifact_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            executor,
            defaults,
            artifact_prefix: artifact_prefix.into(),
        }
    }

    pub fn executor(&self) -> &dyn JobExecutor {
        self.executor.as_ref()
    }

    /// Validate and accept a generation request. Returns as soon as the job is
    /// recorded; production happens in the background.
    pub async fn submit(&self, request: GenerateRequest) -> Result<Job, JobError> {
        let spec = request.resolve(&self.defaults);
        spec.validate()
            .map_err(|report| JobError::InvalidSpecification(report.to_string()))?;

        let job = self.store.create(spec.clone()).await?;
        metrics::counter!("generation_jobs_total").increment(1);
        tracing::info!(job_id = %job.id, prompt = %job.spec.prompt, "Generation job accepted");

        self.executor.dispatch(job.id, spec);
        Ok(job)
    }

    pub async fn get_status(&self, id: Uuid) -> Result<JobView, JobError> {
        let job = self.load(id).await?;
        Ok(JobView::from(&job))
    }

    /// Newest-first listing. `page` is 1-based; pages past the end are empty.
    pub async fn list_jobs(&self, page: i64, page_size: i64) -> Result<JobPage, JobError> {
        let invalid = || JobError::InvalidPagination { page, page_size };

        let page_num = u64::try_from(page).ok().filter(|p| *p >= 1).ok_or_else(invalid)?;
        let size = u64::try_from(page_size)
            .ok()
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .ok_or_else(invalid)?;
        let offset = (page_num - 1).checked_mul(size).ok_or_else(invalid)?;

        let (jobs, total) = self.store.list(offset, size).await?;

        Ok(JobPage {
            items: jobs.iter().map(JobView::from).collect(),
            total,
            page: page_num,
            page_size: size,
            pages: total.div_ceil(size),
        })
    }

    /// Open the artifact of a completed job.
    pub async fn fetch_artifact(&self, id: Uuid) -> Result<Artifact, JobError> {
        let job = self.load(id).await?;
        if job.status != JobStatus::Completed {
            return Err(JobError::NotReady {
                id,
                status: job.status,
            });
        }

        let location = job.result_location.as_deref().ok_or(JobError::ArtifactMissing(id))?;
        let file = match File::open(location).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(job_id = %id, location, "Artifact missing from disk");
                return Err(JobError::ArtifactMissing(id));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(JobError::ArtifactMissing(id));
        }

        Ok(Artifact {
            file,
            len: metadata.len(),
            file_name: self.download_name(id, location),
        })
    }

    /// Remove a finished job and its artifact. Jobs still pending or
    /// processing belong to their worker and cannot be purged.
    pub async fn purge(&self, id: Uuid) -> Result<(), JobError> {
        let job = self.load(id).await?;
        if !job.status.is_terminal() {
            return Err(JobError::JobActive(id));
        }

        self.store.purge(id).await?;

        if let Some(location) = job.result_location.as_deref() {
            match tokio::fs::remove_file(location).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(job_id = %id, location, error = %e, "Failed to remove artifact");
                }
            }
        }

        tracing::info!(job_id = %id, "Job purged");
        Ok(())
    }

    pub async fn stats(&self) -> Result<StatusCounts, JobError> {
        Ok(self.store.status_counts().await?)
    }

    async fn load(&self, id: Uuid) -> Result<Job, JobError> {
        self.store.get(id).await?.ok_or(JobError::NotFound(id))
    }

    fn download_name(&self, id: Uuid, location: &str) -> String {
        let extension = Path::new(location)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(DEFAULT_ARTIFACT_EXTENSION);
        format!("{}_{}.{}", self.artifact_prefix, id, extension)
    }
}
