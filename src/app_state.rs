use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    executor::{BoundedExecutor, JobExecutor, ThreadPerJobExecutor},
    jobs::JobService,
    producer::ArtifactProducer,
    store::JobStore,
};

/// Shared application state passed to all route handlers.
pub struct AppState<S> {
    pub jobs: Arc<JobService<S>>,
    pub producer: Arc<dyn ArtifactProducer>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            jobs: Arc::clone(&self.jobs),
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<S: JobStore> AppState<S> {
    pub fn new(jobs: JobService<S>, producer: Arc<dyn ArtifactProducer>) -> Self {
        Self {
            jobs: Arc::new(jobs),
            producer,
        }
    }

    /// Wire the store and producer together according to `config`.
    pub fn from_config(store: S, producer: Arc<dyn ArtifactProducer>, config: &AppConfig) -> Self {
        let store = Arc::new(store);

        let executor: Arc<dyn JobExecutor> = match config.max_concurrent_jobs {
            Some(capacity) => {
                tracing::info!(capacity, "Using bounded job executor");
                Arc::new(BoundedExecutor::new(Arc::clone(&store), Arc::clone(&producer), capacity))
            }
            None => {
                tracing::warn!("No MAX_CONCURRENT_JOBS set, every job gets its own worker thread");
                Arc::new(ThreadPerJobExecutor::new(Arc::clone(&store), Arc::clone(&producer)))
            }
        };

        let jobs = JobService::new(
            store,
            executor,
            config.generation_defaults(),
            config.artifact_prefix.clone(),
        );

        Self::new(jobs, producer)
    }
}
