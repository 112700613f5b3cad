use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::generation::GenerationSpec;
use crate::models::job::{Job, StatusCounts, Transition, TransitionError};
use crate::services::store::{JobStore, StoreError};

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

pub mod queries;

/// Job store backed by the `generation_jobs` table. Survives restarts.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobStore for PgJobStore {
    async fn create(&self, spec: GenerationSpec) -> Result<Job, StoreError> {
        let job = Job::new(Uuid::new_v4(), spec, Utc::now());
        queries::create_job(&self.pool, &job).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        queries::get_job(&self.pool, id).await
    }

    async fn update(&self, id: Uuid, transition: Transition) -> Result<Job, StoreError> {
        let mut job = queries::get_job(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let expected = job.status;
        job.apply(transition.clone(), Utc::now())
            .map_err(|source| StoreError::InvalidTransition { id, source })?;

        if queries::update_job(&self.pool, &job, expected).await? {
            return Ok(job);
        }

        // The row changed underneath us; report against whatever is there now.
        let current = queries::get_job(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        Err(StoreError::InvalidTransition {
            id,
            source: TransitionError {
                from: current.status,
                to: transition.to_status(),
            },
        })
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Job>, u64), StoreError> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        queries::list_jobs(&self.pool, offset, limit).await
    }

    async fn purge(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        queries::delete_job(&self.pool, id).await
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        queries::count_by_status(&self.pool).await
    }
}
