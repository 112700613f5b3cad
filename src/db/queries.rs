use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::generation::GenerationSpec;
use crate::models::job::{Job, JobStatus, StatusCounts};
use crate::services::store::StoreError;

const JOB_COLUMNS: &str = "id, status, specification, created_at, started_at, completed_at, \
                           result_location, error_detail, resolved_seed";

// Seeds span the full u64 range but the column is a BIGINT, so they are
// stored bit-for-bit. Seeds above i64::MAX read as negative in raw SQL.
fn seed_to_column(seed: u64) -> i64 {
    seed as i64
}

fn seed_from_column(value: i64) -> u64 {
    value as u64
}

fn job_from_row(r: &PgRow) -> Result<Job, StoreError> {
    let status_str: String = r.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown status '{status_str}'")))?;

    let Json(spec): Json<GenerationSpec> = r.try_get("specification")?;

    let resolved_seed = r
        .try_get::<Option<i64>, _>("resolved_seed")?
        .map(seed_from_column);

    Ok(Job {
        id: r.try_get("id")?,
        spec,
        status,
        created_at: r.try_get("created_at")?,
        started_at: r.try_get("started_at")?,
        completed_at: r.try_get("completed_at")?,
        result_location: r.try_get("result_location")?,
        error_detail: r.try_get("error_detail")?,
        resolved_seed,
    })
}

/// Insert a new pending job
pub async fn create_job(pool: &PgPool, job: &Job) -> Result<Job, StoreError> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO generation_jobs (id, status, specification, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job.id)
    .bind(job.status.as_ref())
    .bind(Json(&job.spec))
    .bind(job.created_at)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM generation_jobs WHERE id = $1"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Write every mutable column of `job`, but only if the stored status is still
/// `expected`. Returns whether a row was updated.
pub async fn update_job(pool: &PgPool, job: &Job, expected: JobStatus) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE generation_jobs
        SET status = $2,
            started_at = $3,
            completed_at = $4,
            result_location = $5,
            error_detail = $6,
            resolved_seed = $7
        WHERE id = $1 AND status = $8
        "#,
    )
    .bind(job.id)
    .bind(job.status.as_ref())
    .bind(job.started_at)
    .bind(job.completed_at)
    .bind(job.result_location.as_deref())
    .bind(job.error_detail.as_deref())
    .bind(job.resolved_seed.map(seed_to_column))
    .bind(expected.as_ref())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Page through jobs, newest first, together with the total job count. Both
/// reads share one snapshot so the total always matches the page.
pub async fn list_jobs(
    pool: &PgPool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Job>, u64), StoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM generation_jobs
        ORDER BY created_at DESC, seq DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM generation_jobs")
        .fetch_one(&mut *tx)
        .await?
        .try_get("total")?;

    tx.commit().await?;

    let jobs = rows.iter().map(job_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok((jobs, total.max(0) as u64))
}

/// Delete a job, returning the removed record
pub async fn delete_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>, StoreError> {
    let row = sqlx::query(&format!(
        "DELETE FROM generation_jobs WHERE id = $1 RETURNING {JOB_COLUMNS}"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Job counts grouped by status
pub async fn count_by_status(pool: &PgPool) -> Result<StatusCounts, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT status, COUNT(*) AS count
        FROM generation_jobs
        GROUP BY status
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for r in rows {
        let status_str: String = r.try_get("status")?;
        let status = JobStatus::from_str(&status_str)
            .map_err(|_| StoreError::Corrupt(format!("unknown status '{status_str}'")))?;
        let count: i64 = r.try_get("count")?;
        counts.record(status, count.max(0) as u64);
    }
    Ok(counts)
}
