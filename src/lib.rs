//! # AdLaunch Client Library
//!
//! Client-side toolkit for the AdLaunch backend: it starts landing-page
//! analyses and polls them to completion, coordinates the Facebook login
//! popup, keeps campaign state in a time-bounded local cache, and
//! publishes finished drafts to the connected ad account.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod facebook;
pub mod models;
pub mod poller;
pub mod popup;
pub mod publisher;
pub mod search;
pub mod session;
pub mod store;
pub mod telemetry;
