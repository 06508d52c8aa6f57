//! # Async Job Poller
//!
//! Turns a job id into a terminal result by polling `GET /jobs/{id}` on a
//! fixed cadence, as an explicit state machine:
//!
//! ```text
//! Starting -> Polling -> Complete | Failed | TimedOut | Cancelled
//! ```
//!
//! Attempts are strictly sequential and bounded by
//! [`PollerConfig::max_attempts`]; at the default cadence (2000 ms, 90
//! attempts) a job gets three minutes to finish. Transport and backend
//! failures during a status check abort the poll immediately rather than
//! consuming retry budget. One poll loop may run per job id at a time;
//! the in-flight marker is released on every exit path.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::{counter, histogram};
use scopeguard::guard;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::config::PollerConfig;
use crate::error::ApiError;
use crate::models::JobStatus;

/// Fallback message when the backend marks a job failed without saying why.
const GENERIC_FAILURE: &str = "Analysis failed";

/// Errors a poll can end with.
#[derive(Debug, Error)]
pub enum PollError {
    /// The backend marked the job failed; the message is the backend's
    /// own, or the generic fallback when it gave none.
    #[error("{message}")]
    Failed { message: String },

    /// Attempts exhausted without reaching a terminal status.
    #[error("Analysis timed out. Please try again.")]
    TimedOut { job_id: String, attempts: u32 },

    /// A poll loop for this job id is already running.
    #[error("a poll for job {job_id} is already in progress")]
    AlreadyRunning { job_id: String },

    /// The caller cancelled the poll; no further requests were made.
    #[error("polling cancelled for job {job_id}")]
    Cancelled { job_id: String },

    /// A status check failed outright. Polling stops at once; retry
    /// budget is for slow jobs, not broken connections.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Callback invoked with each observed job status.
pub type ProgressCallback = Box<dyn Fn(JobStatus) + Send + Sync>;

/// Optional knobs for one poll run.
#[derive(Default)]
pub struct PollOptions {
    pub on_progress: Option<ProgressCallback>,
    pub cancel: Option<CancellationToken>,
}

/// Poll loop states. The terminal states carry their outcome.
#[derive(Debug)]
enum PollState {
    Starting,
    Polling { attempt: u32 },
    Complete { result: JsonValue },
    Failed { message: String },
    TimedOut { attempts: u32 },
    Cancelled,
}

/// Bounded poller over the job status endpoint.
#[derive(Clone)]
pub struct JobPoller {
    api: ApiClient,
    config: PollerConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl JobPoller {
    pub fn new(api: ApiClient, config: PollerConfig) -> Self {
        Self {
            api,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Poll a job to completion with default options.
    pub async fn poll(&self, job_id: &str) -> Result<JsonValue, PollError> {
        self.poll_with(job_id, PollOptions::default()).await
    }

    /// Poll a job to completion, reporting progress and honoring
    /// cancellation. Returns the job's result payload.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn poll_with(
        &self,
        job_id: &str,
        options: PollOptions,
    ) -> Result<JsonValue, PollError> {
        self.try_acquire(job_id)?;
        let in_flight = Arc::clone(&self.in_flight);
        let marker = job_id.to_string();
        let _release = guard((), move |_| {
            let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            set.remove(&marker);
        });

        let cancel = options.cancel.unwrap_or_default();
        let interval = Duration::from_millis(self.config.interval_ms);
        let max_attempts = self.config.max_attempts;
        let started = Instant::now();

        let mut state = PollState::Starting;
        loop {
            state = match state {
                PollState::Starting => {
                    info!(max_attempts, interval_ms = self.config.interval_ms, "starting job poll");
                    PollState::Polling { attempt: 1 }
                }
                PollState::Polling { attempt } => {
                    if cancel.is_cancelled() {
                        PollState::Cancelled
                    } else {
                        counter!("adlaunch_poll_attempts_total").increment(1);
                        let record = self.api.get_job(job_id).await?;
                        debug!(attempt, status = %record.status, "poll tick");
                        if let Some(on_progress) = &options.on_progress {
                            on_progress(record.status);
                        }
                        match record.status {
                            JobStatus::Complete => PollState::Complete {
                                result: record.result.unwrap_or(JsonValue::Null),
                            },
                            JobStatus::Failed => PollState::Failed {
                                message: record
                                    .error
                                    .filter(|message| !message.is_empty())
                                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
                            },
                            JobStatus::Pending | JobStatus::Processing
                                if attempt >= max_attempts =>
                            {
                                PollState::TimedOut { attempts: attempt }
                            }
                            JobStatus::Pending | JobStatus::Processing => {
                                tokio::select! {
                                    _ = cancel.cancelled() => PollState::Cancelled,
                                    _ = sleep(interval) => PollState::Polling { attempt: attempt + 1 },
                                }
                            }
                        }
                    }
                }
                PollState::Complete { result } => {
                    histogram!("adlaunch_poll_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                    counter!("adlaunch_poll_success_total").increment(1);
                    info!("job completed");
                    break Ok(result);
                }
                PollState::Failed { message } => {
                    counter!("adlaunch_poll_failure_total").increment(1);
                    warn!(message = %message, "job failed");
                    break Err(PollError::Failed { message });
                }
                PollState::TimedOut { attempts } => {
                    counter!("adlaunch_poll_timeout_total").increment(1);
                    warn!(attempts, "job poll exhausted its attempt budget");
                    break Err(PollError::TimedOut {
                        job_id: job_id.to_string(),
                        attempts,
                    });
                }
                PollState::Cancelled => {
                    counter!("adlaunch_poll_cancelled_total").increment(1);
                    debug!("job poll cancelled");
                    break Err(PollError::Cancelled {
                        job_id: job_id.to_string(),
                    });
                }
            };
        }
    }

    fn try_acquire(&self, job_id: &str) -> Result<(), PollError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(job_id.to_string()) {
            counter!("adlaunch_poll_rejected_total").increment(1);
            return Err(PollError::AlreadyRunning {
                job_id: job_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_is_backend_verbatim() {
        let err = PollError::Failed {
            message: "Could not fetch the page".into(),
        };
        assert_eq!(err.to_string(), "Could not fetch the page");
    }

    #[test]
    fn timeout_message_asks_for_retry() {
        let err = PollError::TimedOut {
            job_id: "j1".into(),
            attempts: 90,
        };
        assert_eq!(err.to_string(), "Analysis timed out. Please try again.");
    }

    #[test]
    fn already_running_names_the_job() {
        let err = PollError::AlreadyRunning { job_id: "j1".into() };
        assert!(err.to_string().contains("j1"));
    }
}
