use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::generation::GenerationSpec;

/// Produces an artifact from a generation spec.
///
/// Implementations are synchronous and may block for minutes. They should
/// report failures through [`ProductionFailure`], but callers must still be
/// prepared for a panic.
pub trait ArtifactProducer: Send + Sync + 'static {
    /// Load whatever the producer needs. Idempotent: once it has succeeded,
    /// further calls return `true` without doing any work.
    fn initialize(&self) -> bool;

    fn produce(&self, spec: &GenerationSpec) -> Result<ProducedArtifact, ProductionFailure>;

    fn status(&self) -> ProducerStatus;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducedArtifact {
    pub result_location: PathBuf,
    pub resolved_seed: u64,
    pub generation_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{detail}")]
pub struct ProductionFailure {
    pub detail: String,
    /// The seed in use when production failed, if one had been chosen.
    pub resolved_seed: Option<u64>,
}

impl ProductionFailure {
    pub fn new(detail: impl Into<String>, resolved_seed: Option<u64>) -> Self {
        Self {
            detail: detail.into(),
            resolved_seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProducerStatus {
    pub initialized: bool,
    pub available: bool,
    pub model_name: String,
    pub artifact_dir: String,
}

/// CPU stand-in for the video model: walks through the inference steps with a
/// fixed delay and writes a small placeholder file instead of a real video.
pub struct SimulatedVideoProducer {
    artifact_dir: PathBuf,
    file_prefix: String,
    step_delay: Duration,
    warmup: Duration,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl SimulatedVideoProducer {
    pub const MODEL_NAME: &'static str = "HunyuanVideo (simulated)";

    pub fn new(
        artifact_dir: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        step_delay: Duration,
        warmup: Duration,
    ) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            file_prefix: file_prefix.into(),
            step_delay,
            warmup,
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.artifact_dir,
            &config.artifact_prefix,
            Duration::from_millis(config.producer_step_delay_ms),
            Duration::from_millis(config.producer_warmup_ms),
        )
    }
}

impl ArtifactProducer for SimulatedVideoProducer {
    fn initialize(&self) -> bool {
        if self.initialized.load(Ordering::Acquire) {
            return true;
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.initialized.load(Ordering::Acquire) {
            return true;
        }

        tracing::info!(model = Self::MODEL_NAME, "Loading video model");
        thread::sleep(self.warmup);

        if let Err(e) = fs::create_dir_all(&self.artifact_dir) {
            tracing::error!(
                error = %e,
                artifact_dir = %self.artifact_dir.display(),
                "Failed to create artifact directory"
            );
            return false;
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(model = Self::MODEL_NAME, "Video model loaded");
        true
    }

    fn produce(&self, spec: &GenerationSpec) -> Result<ProducedArtifact, ProductionFailure> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(ProductionFailure::new("model is not initialized", spec.seed));
        }

        let seed = spec.seed.unwrap_or_else(|| u64::from(rand::thread_rng().gen::<u32>()));
        let start = Instant::now();

        tracing::info!(
            prompt = %spec.prompt,
            width = spec.video_width,
            height = spec.video_height,
            frames = spec.video_length,
            steps = spec.infer_steps,
            seed,
            "Generating video"
        );

        for step in 1..=spec.infer_steps {
            if step % 10 == 0 {
                let percent = f64::from(step) / f64::from(spec.infer_steps) * 100.0;
                tracing::debug!(step, percent, "Generation progress");
            }
            thread::sleep(self.step_delay);
        }

        fs::create_dir_all(&self.artifact_dir).map_err(|e| {
            ProductionFailure::new(format!("failed to create artifact directory: {e}"), Some(seed))
        })?;

        let suffix = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}_{}_{}_{}.mp4",
            self.file_prefix,
            Utc::now().timestamp(),
            seed,
            &suffix[..8]
        );
        let output_path = self.artifact_dir.join(filename);

        let contents = format!(
            "# generated video\n# prompt: {}\n# size: {}x{}, {} frames\n# steps: {}, cfg_scale: {}\n# seed: {}\n",
            spec.prompt,
            spec.video_width,
            spec.video_height,
            spec.video_length,
            spec.infer_steps,
            spec.cfg_scale,
            seed
        );
        fs::write(&output_path, contents).map_err(|e| {
            ProductionFailure::new(
                format!("failed to write {}: {e}", output_path.display()),
                Some(seed),
            )
        })?;

        tracing::info!(output = %output_path.display(), seed, "Video generated");

        Ok(ProducedArtifact {
            result_location: output_path,
            resolved_seed: seed,
            generation_seconds: start.elapsed().as_secs_f64(),
        })
    }

    fn status(&self) -> ProducerStatus {
        ProducerStatus {
            initialized: self.initialized.load(Ordering::Acquire),
            available: true,
            model_name: Self::MODEL_NAME.to_string(),
            artifact_dir: self.artifact_dir.display().to_string(),
        }
    }
}
