use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::models::generation::GenerationSpec;
use crate::models::job::{Job, StatusCounts, Transition, TransitionError};

/// Thread-safe mapping from job id to job record.
///
/// Each job is mutated only through [`JobStore::update`], and only by the
/// worker that owns it. Every call publishes a complete record: readers see a
/// job either before or after a transition, never halfway through one.
pub trait JobStore: Send + Sync + 'static {
    /// Insert a new pending job with a freshly allocated id.
    fn create(&self, spec: GenerationSpec) -> impl Future<Output = Result<Job, StoreError>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<Job>, StoreError>> + Send;

    /// Apply a transition atomically and return the updated record.
    fn update(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> impl Future<Output = Result<Job, StoreError>> + Send;

    /// One page of jobs, newest first, plus the total number of jobs.
    fn list(
        &self,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = Result<(Vec<Job>, u64), StoreError>> + Send;

    /// Remove a job record. Returns the removed record, if any.
    fn purge(&self, id: Uuid) -> impl Future<Output = Result<Option<Job>, StoreError>> + Send;

    fn status_counts(&self) -> impl Future<Output = Result<StatusCounts, StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id}: {source}")]
    InvalidTransition {
        id: Uuid,
        #[source]
        source: TransitionError,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt job record: {0}")]
    Corrupt(String),
}

/// Process-local job store. State lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Jobs>,
}

#[derive(Default)]
struct Jobs {
    next_seq: u64,
    entries: HashMap<Uuid, Entry>,
}

struct Entry {
    /// Insertion order, breaks ties between equal `created_at` values.
    seq: u64,
    job: Job,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Records are replaced whole, so a poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Jobs> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobStore for MemoryJobStore {
    async fn create(&self, spec: GenerationSpec) -> Result<Job, StoreError> {
        let mut jobs = self.lock();

        let mut id = Uuid::new_v4();
        while jobs.entries.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let seq = jobs.next_seq;
        jobs.next_seq += 1;

        let job = Job::new(id, spec, Utc::now());
        jobs.entries.insert(id, Entry { seq, job: job.clone() });
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().entries.get(&id).map(|entry| entry.job.clone()))
    }

    async fn update(&self, id: Uuid, transition: Transition) -> Result<Job, StoreError> {
        let mut jobs = self.lock();
        let entry = jobs.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let mut next = entry.job.clone();
        next.apply(transition, Utc::now())
            .map_err(|source| StoreError::InvalidTransition { id, source })?;
        entry.job = next.clone();
        Ok(next)
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Job>, u64), StoreError> {
        let mut snapshot: Vec<(u64, Job)> = {
            let jobs = self.lock();
            jobs.entries
                .values()
                .map(|entry| (entry.seq, entry.job.clone()))
                .collect()
        };

        snapshot.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });

        let total = snapshot.len() as u64;
        let page = snapshot
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, job)| job)
            .collect();

        Ok((page, total))
    }

    async fn purge(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().entries.remove(&id).map(|entry| entry.job))
    }

    async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let jobs = self.lock();
        let mut counts = StatusCounts::default();
        for entry in jobs.entries.values() {
            counts.record(entry.job.status, 1);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn spec(prompt: &str) -> GenerationSpec {
        GenerationSpec::with_prompt(prompt)
    }

    #[tokio::test]
    async fn test_create_inserts_pending_job() {
        let store = MemoryJobStore::new();
        let job = store.create(spec("eagle over mountains")).await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());

        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched, job);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        let store = MemoryJobStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_applies_transition() {
        let store = MemoryJobStore::new();
        let job = store.create(spec("sunrise")).await.unwrap();

        let updated = store.update(job.id, Transition::Start).await.unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert_eq!(store.get(job.id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let store = MemoryJobStore::new();
        let job = store.create(spec("sunrise")).await.unwrap();

        let err = store
            .update(
                job.id,
                Transition::Complete {
                    result_location: "x.mp4".to_string(),
                    resolved_seed: 1,
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::InvalidTransition { .. });
        assert_eq!(store.get(job.id).await.unwrap().unwrap().status, JobStatus::Pending);

        let err = store.update(Uuid::new_v4(), Transition::Start).await.unwrap_err();
        assert_matches!(err, StoreError::NotFound(_));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_paging() {
        let store = MemoryJobStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.create(spec(&format!("clip {i}"))).await.unwrap().id);
        }

        let (page, total) = store.list(0, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.iter().map(|j| j.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let (page, total) = store.list(4, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[0]);

        let (page, _) = store.list(10, 2).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_purge_and_counts() {
        let store = MemoryJobStore::new();
        let a = store.create(spec("a")).await.unwrap();
        let b = store.create(spec("b")).await.unwrap();
        store.update(b.id, Transition::Start).await.unwrap();

        let counts = store.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.total, 2);

        assert_eq!(store.purge(a.id).await.unwrap().map(|j| j.id), Some(a.id));
        assert!(store.purge(a.id).await.unwrap().is_none());
        assert_eq!(store.status_counts().await.unwrap().total, 1);
    }

    #[test]
    fn test_memory_store_runs_outside_a_runtime() {
        let store = MemoryJobStore::new();
        let job = tokio_test::assert_ok!(tokio_test::block_on(store.create(spec("offline"))));
        let purged = tokio_test::assert_ok!(tokio_test::block_on(store.purge(job.id)));
        assert_eq!(purged, Some(job));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_never_collide() {
        let store = Arc::new(MemoryJobStore::new());
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(spec(&format!("job {i}"))).await.unwrap().id })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }

        let (_, total) = store.list(0, 100).await.unwrap();
        assert_eq!(total, 64);
    }
}
