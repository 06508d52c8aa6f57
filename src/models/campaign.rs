//! Saved campaign model
//!
//! Shapes for the saved-campaign CRUD endpoints and the publish request
//! that hands a finished draft to the ad platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ad_pack::{AdPack, Targeting};

/// A campaign saved on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub name: String,
    /// Backend lifecycle marker, e.g. `draft` or `published`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// The draft contents at save time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_pack: Option<AdPack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response envelope for `GET /campaigns`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CampaignListResponse {
    #[serde(default)]
    pub campaigns: Vec<CampaignRecord>,
}

/// Body of `POST /campaigns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_pack: Option<AdPack>,
}

/// Body of `PATCH /campaigns/{id}`; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaignRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_pack: Option<AdPack>,
}

/// Body of `POST /meta/publish-campaign`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishCampaignRequest {
    /// Page the ad is published under
    pub page_id: String,
    /// Ad account that will be billed
    pub ad_account_id: String,
    pub campaign_name: String,
    pub headline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub primary_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub targeting: Targeting,
    /// Daily budget in major currency units; the backend converts to the
    /// platform's minor units
    pub daily_budget: f64,
    pub duration_days: u32,
    /// Platform call-to-action key, e.g. `LEARN_MORE`
    pub call_to_action: String,
}

/// Response of `POST /meta/publish-campaign`.
///
/// The backend reports creation failures inside a 200 body via
/// `success=false` plus `error`, reserving non-2xx for its own faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<String>,
}
