//! # Publisher
//!
//! Assembles the publish request from the draft and hands it to the
//! backend, with two gates in front: the connection is reconciled against
//! canonical status first, and the chosen ad account must have a payment
//! method. A missing payment method is an answer, not an error; it comes
//! back as [`PublishOutcome::PaymentRequired`] with the add-payment URL.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::facebook::{ConnectError, FacebookCoordinator};
use crate::models::{FbStatus, PublishCampaignRequest, PublishResponse};
use crate::session::CampaignSession;

/// Errors on the road to publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Canonical status says there is no Facebook connection.
    #[error("Facebook account not connected")]
    NotConnected,

    /// The draft lacks something publishing needs.
    #[error("cannot publish yet: {what}")]
    Incomplete { what: &'static str },

    /// The backend accepted the request but the platform refused the
    /// campaign; the message is the backend's own.
    #[error("{message}")]
    Rejected { message: String },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a publish attempt that got past the gates.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(PublishResponse),
    /// The ad account cannot be billed yet.
    PaymentRequired { add_payment_url: Option<String> },
}

/// Publishes finished drafts.
pub struct Publisher {
    api: ApiClient,
    facebook: Arc<FacebookCoordinator>,
}

impl Publisher {
    pub fn new(api: ApiClient, facebook: Arc<FacebookCoordinator>) -> Self {
        Self { api, facebook }
    }

    /// Build the publish request from the current draft and the connected
    /// account's inventory. Unset draft fields fall back to the account's
    /// first page, the pre-selected (or first) ad account, and a campaign
    /// name derived from the analyzed URL.
    pub fn assemble_request(
        session: &CampaignSession,
        status: &FbStatus,
    ) -> Result<PublishCampaignRequest, PublishError> {
        let pack = session.ad_pack().ok_or(PublishError::Incomplete {
            what: "no ad pack; run an analysis first",
        })?;
        let (_, creative) = session.selected_ad().ok_or(PublishError::Incomplete {
            what: "no ad selected",
        })?;
        let draft = session.draft();

        let page_id = draft
            .page_id
            .or_else(|| status.pages.first().map(|page| page.id.clone()))
            .ok_or(PublishError::Incomplete {
                what: "no page available on the connected account",
            })?;
        let ad_account_id = draft
            .ad_account_id
            .or_else(|| status.selected_ad_account_id.clone())
            .or_else(|| status.ad_accounts.first().map(|account| account.id.clone()))
            .ok_or(PublishError::Incomplete {
                what: "no ad account available on the connected account",
            })?;
        let campaign_name = draft.campaign_name.unwrap_or_else(|| match &pack.project_url {
            Some(url) => format!("AdLaunch - {}", url),
            None => "AdLaunch campaign".to_string(),
        });

        Ok(PublishCampaignRequest {
            page_id,
            ad_account_id,
            campaign_name,
            headline: creative.headline,
            description: creative.description,
            primary_text: creative.primary_text,
            image_url: creative.image_url,
            targeting: pack.targeting,
            daily_budget: draft.daily_budget,
            duration_days: draft.duration_days,
            call_to_action: draft.call_to_action,
        })
    }

    /// Publish the session's current draft: reconcile the connection,
    /// assemble the request from the reconciled inventory, gate on
    /// payment readiness, then hand over the campaign.
    #[instrument(skip_all)]
    pub async fn publish_draft(
        &self,
        session: &CampaignSession,
    ) -> Result<PublishOutcome, PublishError> {
        counter!("adlaunch_publish_attempts_total").increment(1);

        let status = self.reconciled_status().await?;
        let request = Self::assemble_request(session, &status)?;
        self.gate_and_send(request).await
    }

    /// Publish a caller-assembled request, with the same connection and
    /// payment gates in front.
    #[instrument(skip_all, fields(ad_account_id = %request.ad_account_id))]
    pub async fn publish(
        &self,
        request: PublishCampaignRequest,
    ) -> Result<PublishOutcome, PublishError> {
        counter!("adlaunch_publish_attempts_total").increment(1);

        self.reconciled_status().await?;
        self.gate_and_send(request).await
    }

    /// Refresh canonical status and require a live connection.
    async fn reconciled_status(&self) -> Result<FbStatus, PublishError> {
        let status = self.facebook.refresh_status().await?;
        if !status.connected {
            warn!("publish refused; no Facebook connection");
            return Err(PublishError::NotConnected);
        }
        Ok(status)
    }

    async fn gate_and_send(
        &self,
        request: PublishCampaignRequest,
    ) -> Result<PublishOutcome, PublishError> {
        let payment = self.api.payment_status(&request.ad_account_id).await?;
        if !payment.has_payment_method {
            counter!("adlaunch_publish_payment_gate_total").increment(1);
            info!("ad account has no payment method");
            return Ok(PublishOutcome::PaymentRequired {
                add_payment_url: payment.add_payment_url,
            });
        }

        let response = self.api.publish_campaign(&request).await?;
        if !response.success {
            counter!("adlaunch_publish_rejected_total").increment(1);
            let message = response
                .error
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "Failed to publish campaign".to_string());
            warn!(message = %message, "platform refused the campaign");
            return Err(PublishError::Rejected { message });
        }

        counter!("adlaunch_publish_success_total").increment(1);
        info!(campaign_id = ?response.campaign_id, "campaign published");
        Ok(PublishOutcome::Published(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollerConfig;
    use crate::models::{AdAccount, Page};
    use crate::poller::JobPoller;
    use crate::session::DraftSettings;
    use crate::store::{MemoryStorage, SessionStore};
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn session_with_pack() -> CampaignSession {
        let api = ApiClient::new(Url::parse("http://localhost:8000").unwrap()).unwrap();
        let poller = JobPoller::new(api.clone(), PollerConfig::default());
        let store = SessionStore::new(
            Arc::new(MemoryStorage::new()),
            Duration::from_secs(4 * 60 * 60),
        );
        let session = CampaignSession::new(api, poller, store);
        session
            .consume_result(
                "seed-job",
                json!({
                    "project_url": "https://example.com",
                    "summary": "A product",
                    "ads": [
                        {"headline": "First", "primary_text": "Body", "description": "Desc"},
                        {"headline": "Second"}
                    ]
                }),
            )
            .unwrap();
        session
    }

    fn connected_status() -> FbStatus {
        FbStatus {
            connected: true,
            user: None,
            pages: vec![Page {
                id: "p-1".into(),
                name: "Shop".into(),
                category: None,
            }],
            ad_accounts: vec![AdAccount {
                id: "act_1".into(),
                name: "Main".into(),
                currency: None,
            }],
            selected_ad_account_id: None,
        }
    }

    #[test]
    fn assemble_requires_a_selected_ad() {
        let session = session_with_pack();
        let err = Publisher::assemble_request(&session, &connected_status()).unwrap_err();
        assert!(matches!(err, PublishError::Incomplete { .. }));
        assert!(err.to_string().contains("no ad selected"));
    }

    #[test]
    fn assemble_fills_defaults_from_status() {
        let session = session_with_pack();
        session.select_ad(0).unwrap();
        let request = Publisher::assemble_request(&session, &connected_status()).unwrap();
        assert_eq!(request.page_id, "p-1");
        assert_eq!(request.ad_account_id, "act_1");
        assert_eq!(request.headline, "First");
        assert_eq!(request.campaign_name, "AdLaunch - https://example.com");
        assert_eq!(request.daily_budget, 10.0);
    }

    #[test]
    fn assemble_prefers_preselected_ad_account() {
        let session = session_with_pack();
        session.select_ad(1).unwrap();
        let mut status = connected_status();
        status.selected_ad_account_id = Some("act_preferred".into());
        let request = Publisher::assemble_request(&session, &status).unwrap();
        assert_eq!(request.ad_account_id, "act_preferred");
        assert_eq!(request.headline, "Second");
    }

    #[test]
    fn assemble_honors_draft_overrides() {
        let session = session_with_pack();
        session.select_ad(0).unwrap();
        session.save_draft(&DraftSettings {
            campaign_name: Some("Spring push".into()),
            page_id: Some("p-override".into()),
            ad_account_id: Some("act_override".into()),
            daily_budget: 42.5,
            duration_days: 14,
            call_to_action: "SIGN_UP".into(),
        });
        let request = Publisher::assemble_request(&session, &connected_status()).unwrap();
        assert_eq!(request.campaign_name, "Spring push");
        assert_eq!(request.page_id, "p-override");
        assert_eq!(request.ad_account_id, "act_override");
        assert_eq!(request.daily_budget, 42.5);
        assert_eq!(request.duration_days, 14);
        assert_eq!(request.call_to_action, "SIGN_UP");
    }

    #[test]
    fn assemble_requires_some_page() {
        let session = session_with_pack();
        session.select_ad(0).unwrap();
        let mut status = connected_status();
        status.pages.clear();
        let err = Publisher::assemble_request(&session, &status).unwrap_err();
        assert!(err.to_string().contains("no page available"));
    }
}
