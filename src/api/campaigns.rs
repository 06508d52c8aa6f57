//! Saved campaign endpoints
//!
//! Plain CRUD over `/campaigns`.

use tracing::instrument;

use super::ApiClient;
use crate::error::ApiError;
use crate::models::{
    CampaignListResponse, CampaignRecord, CreateCampaignRequest, UpdateCampaignRequest,
};

impl ApiClient {
    /// `GET /campaigns`: all campaigns saved by the signed-in user.
    #[instrument(skip_all)]
    pub async fn list_campaigns(&self) -> Result<CampaignListResponse, ApiError> {
        self.execute(
            self.get("/campaigns"),
            "/campaigns",
            "Failed to load campaigns",
        )
        .await
    }

    /// `POST /campaigns`: save a new campaign.
    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn create_campaign(
        &self,
        request: &CreateCampaignRequest,
    ) -> Result<CampaignRecord, ApiError> {
        self.execute(
            self.post("/campaigns").json(request),
            "/campaigns",
            "Failed to save campaign",
        )
        .await
    }

    /// `GET /campaigns/{id}`.
    #[instrument(skip_all, fields(campaign_id = %id))]
    pub async fn get_campaign(&self, id: &str) -> Result<CampaignRecord, ApiError> {
        self.execute(
            self.get(&format!("/campaigns/{}", id)),
            "/campaigns/{id}",
            "Failed to load campaign",
        )
        .await
    }

    /// `PATCH /campaigns/{id}`: partial update; absent fields untouched.
    #[instrument(skip_all, fields(campaign_id = %id))]
    pub async fn update_campaign(
        &self,
        id: &str,
        request: &UpdateCampaignRequest,
    ) -> Result<CampaignRecord, ApiError> {
        self.execute(
            self.patch(&format!("/campaigns/{}", id)).json(request),
            "/campaigns/{id}",
            "Failed to update campaign",
        )
        .await
    }

    /// `DELETE /campaigns/{id}`.
    #[instrument(skip_all, fields(campaign_id = %id))]
    pub async fn delete_campaign(&self, id: &str) -> Result<(), ApiError> {
        self.execute_no_content(
            self.delete(&format!("/campaigns/{}", id)),
            "/campaigns/{id}",
            "Failed to delete campaign",
        )
        .await
    }
}
