//! Facebook connection model
//!
//! Shapes for the canonical connection status, payment readiness, and the
//! location search endpoint. The status endpoint uses camelCase for the ad
//! account fields; everything else on this API is snake_case.

use serde::{Deserialize, Serialize};

/// Canonical connection status as reported by `GET /meta/fb-status`.
///
/// This is the single source of truth for whether the user is connected;
/// locally cached copies are only ever replaced wholesale with one of these.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FbStatus {
    #[serde(default)]
    pub connected: bool,

    /// Linked profile, present only when connected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<FbUser>,

    /// Pages the linked profile can publish for
    #[serde(default)]
    pub pages: Vec<Page>,

    /// Ad accounts the linked profile can spend from
    #[serde(default, rename = "adAccounts")]
    pub ad_accounts: Vec<AdAccount>,

    /// Ad account chosen in a previous session, if any
    #[serde(
        default,
        rename = "selectedAdAccountId",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_ad_account_id: Option<String>,
}

impl FbStatus {
    /// A status representing "not connected", used when purging local state.
    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// Linked Facebook profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FbUser {
    pub id: String,
    pub name: String,
}

/// A page the user manages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// An ad account the user can publish from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdAccount {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Payment readiness of an ad account, from `GET /meta/payment-status`.
///
/// A missing payment method is ordinary data, not an error; the URL points
/// the user at the platform's add-payment flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub has_payment_method: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_payment_url: Option<String>,
}

/// Response envelope for `GET /meta/location-search`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationSearchResponse {
    #[serde(default)]
    pub cities: Vec<LocationHit>,
}

/// One targetable location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHit {
    /// Platform key used in targeting payloads
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub country_name: String,
}
