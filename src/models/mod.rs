//! # Data Models
//!
//! This module contains the request/response DTOs exchanged with the
//! AdLaunch backend, plus the shapes persisted in the local session store.

pub mod account;
pub mod ad_pack;
pub mod campaign;
pub mod fb;
pub mod job;

pub use account::{LoginRequest, RegisterRequest, User};
pub use ad_pack::{AdCreative, AdPack, StylingGuide, Targeting};
pub use campaign::{
    CampaignListResponse, CampaignRecord, CreateCampaignRequest, PublishCampaignRequest,
    PublishResponse, UpdateCampaignRequest,
};
pub use fb::{
    AdAccount, FbStatus, FbUser, LocationHit, LocationSearchResponse, Page, PaymentStatus,
};
pub use job::{JobRecord, JobStatus, StartAnalysisResponse};
