//! Campaign draft model
//!
//! The ad pack is the output of the backend analysis pipeline: a summary of
//! the analyzed landing page, suggested audience targeting, and a set of
//! candidate ad creatives. The generator omits fields it could not infer,
//! so everything beyond the creative texts is lenient on decode.

use serde::{Deserialize, Serialize};

/// Full analysis output for one landing page or product description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdPack {
    /// Source URL the analysis was run against, absent for free-text input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,

    /// One-paragraph summary of what the product does
    #[serde(default)]
    pub summary: String,

    /// The strongest differentiator the generator identified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_selling_proposition: Option<String>,

    /// Customer pain points the product addresses
    #[serde(default)]
    pub pain_points: Vec<String>,

    /// Visual identity extracted from the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styling_guide: Option<StylingGuide>,

    /// Suggested audience targeting
    #[serde(default)]
    pub targeting: Targeting,

    /// Candidate ad creatives, ordered by the generator's confidence
    #[serde(default)]
    pub ads: Vec<AdCreative>,
}

/// Visual identity hints extracted from the analyzed page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StylingGuide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

/// Suggested audience targeting for the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targeting {
    #[serde(default = "default_age_min")]
    pub age_min: u8,
    #[serde(default = "default_age_max")]
    pub age_max: u8,
    /// Targeted genders; empty means all
    #[serde(default)]
    pub genders: Vec<String>,
    /// Location keys as returned by the location search endpoint
    #[serde(default)]
    pub locations: Vec<String>,
    /// Interest names understood by the ad platform
    #[serde(default)]
    pub interests: Vec<String>,
}

impl Default for Targeting {
    fn default() -> Self {
        Self {
            age_min: default_age_min(),
            age_max: default_age_max(),
            genders: Vec::new(),
            locations: Vec::new(),
            interests: Vec::new(),
        }
    }
}

fn default_age_min() -> u8 {
    18
}

fn default_age_max() -> u8 {
    65
}

/// One candidate ad creative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCreative {
    /// Short attention line shown above the media
    pub headline: String,
    /// Secondary line shown below the headline
    #[serde(default)]
    pub description: String,
    /// Body copy of the ad
    #[serde(default)]
    pub primary_text: String,
    /// Suggested image, absent when the generator produced text only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
