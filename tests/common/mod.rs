//! Shared helpers for service-level and HTTP-level tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use videogen_service::app_state::AppState;
use videogen_service::models::generation::{
    GenerateRequest, GenerationDefaults, GenerationSpec, JobView,
};
use videogen_service::models::job::JobStatus;
use videogen_service::routes;
use videogen_service::services::executor::{BoundedExecutor, JobExecutor, ThreadPerJobExecutor};
use videogen_service::services::jobs::JobService;
use videogen_service::services::producer::{
    ArtifactProducer, ProducedArtifact, ProducerStatus, ProductionFailure,
};
use videogen_service::services::store::MemoryJobStore;

/// A latch that blocks producer threads until a test opens it.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    /// Wait until opened, giving up after ten seconds so a failing test
    /// cannot hang the runtime on shutdown.
    pub fn wait(&self) {
        let guard = self.open.lock().unwrap();
        let _unused = self
            .cv
            .wait_timeout_while(guard, Duration::from_secs(10), |open| !*open)
            .unwrap();
    }
}

/// Producer whose behaviour is picked by the prompt:
/// - contains "panic": panics
/// - contains "fail": returns a structured failure
/// - contains "wait": blocks on the gate, then succeeds
/// - anything else: succeeds immediately
pub struct ScriptedProducer {
    dir: PathBuf,
    pub gate: Gate,
    initialized: AtomicBool,
    init_fails: bool,
    pub calls: AtomicUsize,
}

impl ScriptedProducer {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            gate: Gate::default(),
            initialized: AtomicBool::new(false),
            init_fails: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_init(dir: &Path) -> Self {
        Self {
            init_fails: true,
            ..Self::new(dir)
        }
    }
}

impl ArtifactProducer for ScriptedProducer {
    fn initialize(&self) -> bool {
        if self.init_fails {
            return false;
        }
        self.initialized.store(true, Ordering::SeqCst);
        true
    }

    fn produce(&self, spec: &GenerationSpec) -> Result<ProducedArtifact, ProductionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if spec.prompt.contains("panic") {
            panic!("scripted producer fault");
        }
        if spec.prompt.contains("fail") {
            return Err(ProductionFailure::new("scripted failure", spec.seed));
        }
        if spec.prompt.contains("wait") {
            self.gate.wait();
        }

        let seed = spec.seed.unwrap_or(4242);
        let path = self.dir.join(format!("{}.mp4", Uuid::new_v4()));
        std::fs::write(&path, format!("video for {}", spec.prompt))
            .map_err(|e| ProductionFailure::new(e.to_string(), Some(seed)))?;

        Ok(ProducedArtifact {
            result_location: path,
            resolved_seed: seed,
            generation_seconds: 0.0,
        })
    }

    fn status(&self) -> ProducerStatus {
        ProducerStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            available: true,
            model_name: "scripted".to_string(),
            artifact_dir: self.dir.display().to_string(),
        }
    }
}

pub struct Harness {
    pub state: AppState<MemoryJobStore>,
    pub producer: Arc<ScriptedProducer>,
    pub dir: TempDir,
}

impl Harness {
    pub fn service(&self) -> &JobService<MemoryJobStore> {
        &self.state.jobs
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }
}

/// Unbounded executor over an in-memory store.
pub fn harness() -> Harness {
    build_harness(None, false)
}

pub fn bounded_harness(capacity: usize) -> Harness {
    build_harness(Some(capacity), false)
}

pub fn failing_init_harness() -> Harness {
    build_harness(None, true)
}

fn build_harness(capacity: Option<usize>, init_fails: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let producer = Arc::new(if init_fails {
        ScriptedProducer::failing_init(dir.path())
    } else {
        ScriptedProducer::new(dir.path())
    });
    let dyn_producer: Arc<dyn ArtifactProducer> = producer.clone();

    let store = Arc::new(MemoryJobStore::new());
    let executor: Arc<dyn JobExecutor> = match capacity {
        Some(capacity) => Arc::new(BoundedExecutor::new(
            Arc::clone(&store),
            Arc::clone(&dyn_producer),
            capacity,
        )),
        None => Arc::new(ThreadPerJobExecutor::new(
            Arc::clone(&store),
            Arc::clone(&dyn_producer),
        )),
    };

    let service = JobService::new(store, executor, GenerationDefaults::default(), "video");
    Harness {
        state: AppState::new(service, dyn_producer),
        producer,
        dir,
    }
}

pub fn request(prompt: &str) -> GenerateRequest {
    GenerateRequest {
        prompt: Some(prompt.to_string()),
        ..Default::default()
    }
}

/// Poll until the job reaches `status` (or any terminal state when waiting
/// for a non-terminal one has become impossible).
pub async fn wait_for_status(
    service: &JobService<MemoryJobStore>,
    id: Uuid,
    status: JobStatus,
) -> JobView {
    for _ in 0..500 {
        let view = service.get_status(id).await.unwrap();
        if view.status == status || (view.status.is_terminal() && !status.is_terminal()) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {status}");
}

/// Poll until the job is completed or failed.
pub async fn wait_for_terminal(service: &JobService<MemoryJobStore>, id: Uuid) -> JobView {
    for _ in 0..500 {
        let view = service.get_status(id).await.unwrap();
        if view.status.is_terminal() {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never finished");
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
