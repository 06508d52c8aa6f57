//! Analysis job endpoints
//!
//! Starting an analysis and polling its job record. The poll endpoint is
//! read-only; all lifecycle transitions happen on the backend.

use serde_json::json;
use tracing::instrument;

use super::ApiClient;
use crate::error::ApiError;
use crate::models::{JobRecord, StartAnalysisResponse};

impl ApiClient {
    /// `POST /analyze/async`: submit a landing page URL for analysis.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn start_analysis(&self, url: &str) -> Result<StartAnalysisResponse, ApiError> {
        self.execute(
            self.post("/analyze/async").json(&json!({ "url": url })),
            "/analyze/async",
            "Failed to start analysis",
        )
        .await
    }

    /// `GET /jobs/{job_id}`: fetch the current job record.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn get_job(&self, job_id: &str) -> Result<JobRecord, ApiError> {
        self.execute(
            self.get(&format!("/jobs/{}", job_id)),
            "/jobs/{job_id}",
            "Failed to check analysis status",
        )
        .await
    }
}
