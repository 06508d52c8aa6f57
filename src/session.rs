//! # Campaign Session
//!
//! The working draft: typed accessors over the store for the analysis
//! result, the chosen creative, the user's publish settings, and the
//! free-text input, plus the analyze-then-poll orchestration that fills
//! them. A job's result is consumed into the store at most once per job
//! id, so replaying a wait cannot clobber edits made since.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{AdCreative, AdPack, StartAnalysisResponse};
use crate::poller::{JobPoller, PollError, PollOptions};
use crate::store::{SessionStore, keys};

/// Errors from draft operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The job completed but its payload is not an ad pack.
    #[error("analysis result could not be read: {detail}")]
    MalformedResult { detail: String },

    #[error("no ad pack available; run an analysis first")]
    NoAdPack,

    #[error("ad index {index} is out of range; the pack has {len} ads")]
    BadAdIndex { index: usize, len: usize },
}

/// User-edited publish settings layered over the generated pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSettings {
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub ad_account_id: Option<String>,
    #[serde(default = "default_daily_budget")]
    pub daily_budget: f64,
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    #[serde(default = "default_call_to_action")]
    pub call_to_action: String,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            campaign_name: None,
            page_id: None,
            ad_account_id: None,
            daily_budget: default_daily_budget(),
            duration_days: default_duration_days(),
            call_to_action: default_call_to_action(),
        }
    }
}

fn default_daily_budget() -> f64 {
    10.0
}

fn default_duration_days() -> u32 {
    7
}

fn default_call_to_action() -> String {
    "LEARN_MORE".to_string()
}

/// The current campaign draft and its lifecycle operations.
#[derive(Clone)]
pub struct CampaignSession {
    api: ApiClient,
    poller: JobPoller,
    store: SessionStore,
}

impl CampaignSession {
    pub fn new(api: ApiClient, poller: JobPoller, store: SessionStore) -> Self {
        Self { api, poller, store }
    }

    /// Submit a URL for analysis, remembering it as the session input.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn start_analysis(&self, url: &str) -> Result<StartAnalysisResponse, SessionError> {
        self.store.set(keys::INPUT, &url.to_string());
        let started = self.api.start_analysis(url).await?;
        info!(job_id = %started.job_id, "analysis started");
        Ok(started)
    }

    /// Start an analysis and wait for its pack.
    pub async fn analyze(&self, url: &str, options: PollOptions) -> Result<AdPack, SessionError> {
        let started = self.start_analysis(url).await?;
        self.wait_for_result(&started.job_id, options).await
    }

    /// Poll an already-started job to completion and consume its result.
    pub async fn wait_for_result(
        &self,
        job_id: &str,
        options: PollOptions,
    ) -> Result<AdPack, SessionError> {
        let result = self.poller.poll_with(job_id, options).await?;
        self.consume_result(job_id, result)
    }

    /// Store a completed job's pack, at most once per job id. A repeat
    /// consumption returns the pack without touching the store, so edits
    /// made after the first consumption survive.
    pub(crate) fn consume_result(
        &self,
        job_id: &str,
        result: JsonValue,
    ) -> Result<AdPack, SessionError> {
        let pack: AdPack = serde_json::from_value(result).map_err(|err| {
            SessionError::MalformedResult {
                detail: err.to_string(),
            }
        })?;

        let last_consumed: Option<String> = self.store.get(keys::LAST_JOB);
        if last_consumed.as_deref() == Some(job_id) {
            debug!(job_id, "result already consumed; leaving store untouched");
            return Ok(pack);
        }

        self.store.set_with_ttl(keys::AD_PACK, &pack);
        // A fresh pack invalidates any previous creative choice.
        self.store.remove(keys::SELECTED_AD);
        self.store.set(keys::LAST_JOB, &job_id.to_string());
        info!(job_id, ads = pack.ads.len(), "analysis result stored");
        Ok(pack)
    }

    /// The current pack, if one is stored and fresh.
    pub fn ad_pack(&self) -> Option<AdPack> {
        self.store.get_session_value(keys::AD_PACK)
    }

    /// Choose a creative from the pack by index.
    pub fn select_ad(&self, index: usize) -> Result<AdCreative, SessionError> {
        let pack = self.ad_pack().ok_or(SessionError::NoAdPack)?;
        let creative = pack
            .ads
            .get(index)
            .cloned()
            .ok_or(SessionError::BadAdIndex {
                index,
                len: pack.ads.len(),
            })?;
        self.store.set_with_ttl(keys::SELECTED_AD, &index);
        Ok(creative)
    }

    /// The chosen creative, if the choice is still valid for the pack.
    pub fn selected_ad(&self) -> Option<(usize, AdCreative)> {
        let index: usize = self.store.get_session_value(keys::SELECTED_AD)?;
        let pack = self.ad_pack()?;
        pack.ads.get(index).cloned().map(|creative| (index, creative))
    }

    /// Free-text input; kept without a TTL.
    pub fn input(&self) -> Option<String> {
        self.store.get(keys::INPUT)
    }

    pub fn set_input(&self, text: &str) {
        self.store.set(keys::INPUT, &text.to_string());
    }

    /// Publish settings for the current draft, defaulted when unset.
    pub fn draft(&self) -> DraftSettings {
        self.store
            .get_session_value(keys::DRAFT)
            .unwrap_or_default()
    }

    pub fn save_draft(&self, draft: &DraftSettings) {
        self.store.set_with_ttl(keys::DRAFT, draft);
    }

    /// Drop the whole working draft. Connection and account state stay.
    pub fn reset(&self) {
        self.store.reset_session();
        info!("campaign session reset");
    }
}
