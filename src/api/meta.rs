//! Meta platform endpoints
//!
//! The backend owns the Graph API handshake and token storage; these calls
//! observe connection state, manage the session, and hand over finished
//! campaigns. The Facebook session token (when present) rides along
//! automatically as the `X-FB-Session` header, with the account cookie as
//! the backend's fallback identity.

use tracing::instrument;

use super::ApiClient;
use crate::error::ApiError;
use crate::models::{
    FbStatus, LocationSearchResponse, PaymentStatus, PublishCampaignRequest, PublishResponse,
};

impl ApiClient {
    /// `GET /meta/fb-status`: canonical connection status.
    #[instrument(skip_all)]
    pub async fn fb_status(&self) -> Result<FbStatus, ApiError> {
        self.execute(
            self.get("/meta/fb-status"),
            "/meta/fb-status",
            "Failed to check Facebook connection",
        )
        .await
    }

    /// URL of the OAuth popup target. The handshake itself happens in the
    /// popup; the outcome arrives out-of-band.
    pub fn facebook_login_url(&self) -> String {
        self.absolute_url("/auth/facebook")
    }

    /// `POST /meta/disconnect`: invalidate the backend's Facebook session.
    #[instrument(skip_all)]
    pub async fn disconnect_facebook(&self) -> Result<(), ApiError> {
        self.execute_no_content(
            self.post("/meta/disconnect"),
            "/meta/disconnect",
            "Failed to disconnect Facebook",
        )
        .await
    }

    /// `GET /meta/payment-status`: payment readiness of one ad account.
    #[instrument(skip_all, fields(ad_account_id = %ad_account_id))]
    pub async fn payment_status(&self, ad_account_id: &str) -> Result<PaymentStatus, ApiError> {
        self.execute(
            self.get("/meta/payment-status")
                .query(&[("ad_account_id", ad_account_id)]),
            "/meta/payment-status",
            "Failed to check payment status",
        )
        .await
    }

    /// `POST /meta/publish-campaign`: hand a finished draft to the platform.
    #[instrument(skip_all, fields(ad_account_id = %request.ad_account_id, page_id = %request.page_id))]
    pub async fn publish_campaign(
        &self,
        request: &PublishCampaignRequest,
    ) -> Result<PublishResponse, ApiError> {
        self.execute(
            self.post("/meta/publish-campaign").json(request),
            "/meta/publish-campaign",
            "Failed to publish campaign",
        )
        .await
    }

    /// `GET /meta/location-search`: targetable locations matching a query.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn search_locations(&self, query: &str) -> Result<LocationSearchResponse, ApiError> {
        self.execute(
            self.get("/meta/location-search").query(&[("q", query)]),
            "/meta/location-search",
            "Location search failed",
        )
        .await
    }
}
