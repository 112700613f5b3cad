use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::models::generation::GenerationSpec;

/// Status of a generation job.
///
/// A job only ever moves forward along
/// `pending -> processing -> completed | failed`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A state change applied to a job by the worker that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start,
    Complete {
        result_location: String,
        resolved_seed: u64,
    },
    Fail {
        error_detail: String,
        resolved_seed: Option<u64>,
    },
}

impl Transition {
    /// The only status this transition may be applied from.
    pub fn from_status(&self) -> JobStatus {
        match self {
            Transition::Start => JobStatus::Pending,
            Transition::Complete { .. } | Transition::Fail { .. } => JobStatus::Processing,
        }
    }

    pub fn to_status(&self) -> JobStatus {
        match self {
            Transition::Start => JobStatus::Processing,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A video generation job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub spec: GenerationSpec,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_location: Option<String>,
    pub error_detail: Option<String>,
    pub resolved_seed: Option<u64>,
}

impl Job {
    pub fn new(id: Uuid, spec: GenerationSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            spec,
            status: JobStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            result_location: None,
            error_detail: None,
            resolved_seed: None,
        }
    }

    /// Apply `transition` at wall-clock time `now`.
    ///
    /// Timestamps are clamped so that `created_at <= started_at <= completed_at`
    /// holds even if the clock steps backwards between transitions. On error
    /// the job is left untouched.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != transition.from_status() {
            return Err(TransitionError {
                from: self.status,
                to: transition.to_status(),
            });
        }

        match transition {
            Transition::Start => {
                self.status = JobStatus::Processing;
                self.started_at = Some(now.max(self.created_at));
            }
            Transition::Complete {
                result_location,
                resolved_seed,
            } => {
                self.status = JobStatus::Completed;
                self.result_location = Some(result_location);
                self.resolved_seed = Some(resolved_seed);
                self.completed_at = Some(self.clamp_completion(now));
            }
            Transition::Fail {
                error_detail,
                resolved_seed,
            } => {
                self.status = JobStatus::Failed;
                self.error_detail = Some(error_detail);
                self.resolved_seed = resolved_seed;
                self.completed_at = Some(self.clamp_completion(now));
            }
        }

        Ok(())
    }

    fn clamp_completion(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.started_at.unwrap_or(self.created_at))
    }

    /// Wall-clock seconds between start and completion, once terminal.
    pub fn generation_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                Some((completed - started).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

/// Per-status job counts, used for health reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
        self.total += count;
    }
}
