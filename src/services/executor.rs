use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use uuid::Uuid;

use crate::models::generation::GenerationSpec;
use crate::models::job::Transition;
use crate::services::producer::{ArtifactProducer, ProductionFailure};
use crate::services::store::JobStore;

/// Runs accepted jobs in the background.
///
/// `dispatch` never blocks and never rejects: by the time it is called the job
/// already exists as a pending record, and every outcome from here on is
/// recorded on that record. Must be called from within a Tokio runtime.
pub trait JobExecutor: Send + Sync {
    fn dispatch(&self, job_id: Uuid, spec: GenerationSpec);

    /// Jobs currently inside the producer.
    fn in_flight(&self) -> usize;
}

/// Spawns one worker per job with no concurrency ceiling.
///
/// Every submission gets its own blocking thread for the producer call, so a
/// burst of submissions translates directly into a burst of threads. Use
/// [`BoundedExecutor`] where submission rates are not under your control.
pub struct ThreadPerJobExecutor<S> {
    worker: Arc<Worker<S>>,
}

impl<S: JobStore> ThreadPerJobExecutor<S> {
    pub fn new(store: Arc<S>, producer: Arc<dyn ArtifactProducer>) -> Self {
        Self {
            worker: Arc::new(Worker::new(store, producer)),
        }
    }
}

impl<S: JobStore> JobExecutor for ThreadPerJobExecutor<S> {
    fn dispatch(&self, job_id: Uuid, spec: GenerationSpec) {
        let worker = Arc::clone(&self.worker);
        tokio::spawn(async move { worker.run(job_id, spec).await });
    }

    fn in_flight(&self) -> usize {
        self.worker.in_flight.load(Ordering::Relaxed)
    }
}

/// Runs at most `capacity` jobs at once. Jobs past the limit wait in the
/// pending state for a permit; none are rejected.
///
/// `dispatch` pushes onto a queue drained by a single task, which takes a
/// permit before starting each worker. Jobs therefore start in the order they
/// were dispatched.
pub struct BoundedExecutor<S> {
    queue: mpsc::UnboundedSender<(Uuid, GenerationSpec)>,
    /// Handed to the draining task on first dispatch, so construction does not
    /// need a runtime.
    receiver: Mutex<Option<mpsc::UnboundedReceiver<(Uuid, GenerationSpec)>>>,
    worker: Arc<Worker<S>>,
    permits: Arc<Semaphore>,
}

impl<S: JobStore> BoundedExecutor<S> {
    pub fn new(store: Arc<S>, producer: Arc<dyn ArtifactProducer>, capacity: usize) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        Self {
            queue,
            receiver: Mutex::new(Some(receiver)),
            worker: Arc::new(Worker::new(store, producer)),
            permits: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    async fn drain(
        worker: Arc<Worker<S>>,
        permits: Arc<Semaphore>,
        mut receiver: mpsc::UnboundedReceiver<(Uuid, GenerationSpec)>,
    ) {
        while let Some((job_id, spec)) = receiver.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                tracing::error!(job_id = %job_id, "Executor closed before job could start");
                return;
            };
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                worker.run(job_id, spec).await;
                drop(permit);
            });
        }
    }
}

impl<S: JobStore> JobExecutor for BoundedExecutor<S> {
    fn dispatch(&self, job_id: Uuid, spec: GenerationSpec) {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(receiver) = receiver {
            tokio::spawn(Self::drain(
                Arc::clone(&self.worker),
                Arc::clone(&self.permits),
                receiver,
            ));
        }

        if self.queue.send((job_id, spec)).is_err() {
            tracing::error!(job_id = %job_id, "Job queue closed, job stays pending");
        }
    }

    fn in_flight(&self) -> usize {
        self.worker.in_flight.load(Ordering::Relaxed)
    }
}

struct Worker<S> {
    store: Arc<S>,
    producer: Arc<dyn ArtifactProducer>,
    in_flight: AtomicUsize,
}

impl<S: JobStore> Worker<S> {
    fn new(store: Arc<S>, producer: Arc<dyn ArtifactProducer>) -> Self {
        Self {
            store,
            producer,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Drive one job from pending to a terminal state. Runs exactly once per
    /// job; nothing here propagates to the submitter.
    async fn run(&self, job_id: Uuid, spec: GenerationSpec) {
        if let Err(e) = self.store.update(job_id, Transition::Start).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as processing");
            return;
        }

        tracing::info!(job_id = %job_id, "Processing generation job");
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!("generation_jobs_in_flight").increment(1.0);
        let start = Instant::now();

        let requested_seed = spec.seed;
        let producer = Arc::clone(&self.producer);
        let outcome = tokio::task::spawn_blocking(move || {
            if !producer.status().initialized && !producer.initialize() {
                return Err(ProductionFailure::new(
                    "artifact producer failed to initialize",
                    spec.seed,
                ));
            }
            producer.produce(&spec)
        })
        .await;

        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        metrics::gauge!("generation_jobs_in_flight").decrement(1.0);
        let elapsed = start.elapsed();
        metrics::histogram!("generation_processing_seconds").record(elapsed.as_secs_f64());

        let transition = match outcome {
            Ok(Ok(artifact)) => {
                metrics::counter!("generation_jobs_completed").increment(1);
                tracing::info!(
                    job_id = %job_id,
                    output = %artifact.result_location.display(),
                    seed = artifact.resolved_seed,
                    duration_ms = elapsed.as_millis() as u64,
                    "Job completed successfully"
                );
                Transition::Complete {
                    result_location: artifact.result_location.to_string_lossy().into_owned(),
                    resolved_seed: artifact.resolved_seed,
                }
            }
            Ok(Err(failure)) => {
                metrics::counter!("generation_jobs_failed").increment(1);
                tracing::warn!(job_id = %job_id, error = %failure, "Job failed");
                Transition::Fail {
                    error_detail: failure.detail,
                    resolved_seed: failure.resolved_seed.or(requested_seed),
                }
            }
            Err(join_error) => {
                metrics::counter!("generation_jobs_failed").increment(1);
                let error_detail = describe_fault(join_error);
                tracing::error!(job_id = %job_id, error = %error_detail, "Producer faulted");
                Transition::Fail {
                    error_detail,
                    resolved_seed: requested_seed,
                }
            }
        };

        if let Err(e) = self.store.update(job_id, transition).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
        }
    }
}

fn describe_fault(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "generation was cancelled".to_string();
    }
    format!(
        "artifact producer panicked: {}",
        panic_message(join_error.into_panic().as_ref())
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
