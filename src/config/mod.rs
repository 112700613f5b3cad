use serde::Deserialize;

use crate::models::generation::GenerationDefaults;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Jobs are kept in memory when unset.
    pub database_url: Option<String>,

    /// Directory generated videos are written to
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Prefix for generated and downloaded file names
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    /// Upper bound on concurrently running jobs. Unbounded when unset.
    pub max_concurrent_jobs: Option<usize>,

    /// Simulated time per inference step, in milliseconds
    #[serde(default = "default_step_delay_ms")]
    pub producer_step_delay_ms: u64,

    /// Simulated model load time, in milliseconds
    #[serde(default = "default_warmup_ms")]
    pub producer_warmup_ms: u64,

    /// Load the model at startup instead of on the first job
    #[serde(default = "default_true")]
    pub initialize_on_startup: bool,

    #[serde(default = "default_video_width")]
    pub default_video_width: u32,

    #[serde(default = "default_video_height")]
    pub default_video_height: u32,

    #[serde(default = "default_video_length")]
    pub default_video_length: u32,

    #[serde(default = "default_infer_steps")]
    pub default_infer_steps: u32,

    #[serde(default = "default_cfg_scale")]
    pub default_cfg_scale: f64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_artifact_dir() -> String {
    "./generated_videos".to_string()
}

fn default_artifact_prefix() -> String {
    "video".to_string()
}

fn default_step_delay_ms() -> u64 {
    100
}

fn default_warmup_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_video_width() -> u32 {
    GenerationDefaults::default().video_width
}

fn default_video_height() -> u32 {
    GenerationDefaults::default().video_height
}

fn default_video_length() -> u32 {
    GenerationDefaults::default().video_length
}

fn default_infer_steps() -> u32 {
    GenerationDefaults::default().infer_steps
}

fn default_cfg_scale() -> f64 {
    GenerationDefaults::default().cfg_scale
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn generation_defaults(&self) -> GenerationDefaults {
        GenerationDefaults {
            video_width: self.default_video_width,
            video_height: self.default_video_height,
            video_length: self.default_video_length,
            infer_steps: self.default_infer_steps,
            cfg_scale: self.default_cfg_scale,
        }
    }
}
