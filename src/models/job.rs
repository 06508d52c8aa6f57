//! Analysis job model
//!
//! Shapes returned by the asynchronous analysis endpoints. A job is created
//! by `POST /analyze/async` and observed read-only through `GET /jobs/{id}`
//! until it reaches a terminal status.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lifecycle states reported by the job status endpoint.
///
/// The set is closed: a status outside these four spellings is a decode
/// error, not a fifth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    /// Whether the job can still change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Wire spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to `POST /analyze/async`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAnalysisResponse {
    /// Opaque identifier used for all subsequent status checks
    pub job_id: String,
    /// Status at creation time, normally `pending`
    pub status: JobStatus,
    /// The URL the backend accepted for analysis
    #[serde(default)]
    pub url: Option<String>,
}

/// Snapshot of a job from `GET /jobs/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    /// Result payload, present only once the job is `complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Failure message, present only once the job is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
