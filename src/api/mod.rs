//! # HTTP Client Layer
//!
//! One [`ApiClient`] per process wraps a shared `reqwest` client, the
//! backend base URL, and the two pieces of per-user request state: the
//! account session cookie and the Facebook session token. Typed wrappers
//! for each backend resource live in the submodules and attach themselves
//! as further `impl ApiClient` blocks.
//!
//! Response handling is uniform: non-2xx bodies go through
//! [`ApiError::backend`] so the backend's `detail`/`error` message is
//! surfaced verbatim, and 2xx bodies are read as text first so a shape
//! mismatch reports the offending payload instead of a bare serde error.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use metrics::{counter, histogram};
use reqwest::{Method, RequestBuilder, header};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::telemetry;

pub mod analysis;
pub mod auth;
pub mod campaigns;
pub mod meta;

const USER_AGENT: &str = concat!("AdLaunch-Client/", env!("CARGO_PKG_VERSION"));

/// Mutable per-user request state shared by all clones of the client.
#[derive(Debug, Default)]
struct ClientState {
    /// Account session cookie as a `name=value` pair, replayed verbatim
    session_cookie: Option<String>,
    /// Facebook session token sent as `X-FB-Session`
    fb_session: Option<String>,
}

/// Shared HTTP client for the AdLaunch backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    /// Base URL string with the trailing slash trimmed
    base: String,
    state: Arc<RwLock<ClientState>>,
}

impl ApiClient {
    /// Creates a client for the given backend base URL.
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base: base_url.as_str().trim_end_matches('/').to_string(),
            state: Arc::new(RwLock::new(ClientState::default())),
        })
    }

    /// The backend base URL with the trailing slash trimmed.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Absolute URL for a backend path, for surfaces that hand the URL to
    /// an external process (the OAuth popup target).
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Replace the Facebook session token attached to subsequent requests.
    pub fn set_fb_session(&self, token: Option<String>) {
        self.write_state().fb_session = token;
    }

    /// The Facebook session token currently attached to requests.
    pub fn fb_session(&self) -> Option<String> {
        self.read_state().fb_session.clone()
    }

    /// Replace the account session cookie attached to subsequent requests.
    pub fn set_session_cookie(&self, cookie: Option<String>) {
        self.write_state().session_cookie = cookie;
    }

    /// The account session cookie currently attached to requests.
    pub fn session_cookie(&self) -> Option<String> {
        self.read_state().session_cookie.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ClientState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ClientState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a request with the standard headers and per-user state attached.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base, path));
        if let Some(trace_id) = telemetry::current_trace_id() {
            builder = builder.header("X-Request-Id", trace_id);
        }
        let state = self.read_state();
        if let Some(cookie) = &state.session_cookie {
            builder = builder.header(header::COOKIE, cookie.clone());
        }
        if let Some(token) = &state.fb_session {
            builder = builder.header("X-FB-Session", token.clone());
        }
        builder
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub(crate) fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Send a request and decode the JSON body.
    ///
    /// `endpoint` labels metrics and decode errors; `fallback` is the error
    /// message used when a failure body carries no `detail`/`error` field.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: &'static str,
        fallback: &'static str,
    ) -> Result<T, ApiError> {
        let body = self.execute_raw(builder, endpoint, fallback).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(err) => {
                counter!("adlaunch_api_decode_errors_total", "endpoint" => endpoint).increment(1);
                Err(ApiError::decode(endpoint, err, &body))
            }
        }
    }

    /// Send a request, requiring a 2xx status but ignoring the body.
    pub(crate) async fn execute_no_content(
        &self,
        builder: RequestBuilder,
        endpoint: &'static str,
        fallback: &'static str,
    ) -> Result<(), ApiError> {
        self.execute_raw(builder, endpoint, fallback).await?;
        Ok(())
    }

    /// Send a request and decode the JSON body, also capturing the session
    /// cookie from the response. Used by the login and register endpoints.
    pub(crate) async fn execute_capturing_cookie<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: &'static str,
        fallback: &'static str,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        self.record_request(endpoint, started, status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::backend(status, &body, fallback));
        }

        if let Some(cookie) = extract_session_cookie(response.headers()) {
            debug!(endpoint, "captured session cookie");
            self.set_session_cookie(Some(cookie));
        }

        let body = response.text().await?;
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(err) => Err(ApiError::decode(endpoint, err, &body)),
        }
    }

    async fn execute_raw(
        &self,
        builder: RequestBuilder,
        endpoint: &'static str,
        fallback: &'static str,
    ) -> Result<String, ApiError> {
        let started = Instant::now();
        let response = builder.send().await.map_err(|err| {
            counter!("adlaunch_api_transport_errors_total", "endpoint" => endpoint).increment(1);
            ApiError::from(err)
        })?;
        let status = response.status();
        self.record_request(endpoint, started, status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(endpoint, status = status.as_u16(), "backend reported failure");
            return Err(ApiError::backend(status, &body, fallback));
        }
        Ok(response.text().await?)
    }

    fn record_request(&self, endpoint: &'static str, started: Instant, status: u16) {
        histogram!("adlaunch_api_request_duration_ms", "endpoint" => endpoint)
            .record(started.elapsed().as_secs_f64() * 1_000.0);
        if status >= 400 {
            counter!("adlaunch_api_backend_errors_total", "endpoint" => endpoint).increment(1);
        } else {
            counter!("adlaunch_api_requests_total", "endpoint" => endpoint).increment(1);
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Session state stays out of debug output.
        f.debug_struct("ApiClient").field("base", &self.base).finish()
    }
}

/// Pull the `name=value` pair out of the first `Set-Cookie` header.
///
/// The backend names its session cookie; storing the whole pair keeps the
/// client agnostic to that name.
fn extract_session_cookie(headers: &header::HeaderMap) -> Option<String> {
    let raw = headers.get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = raw.split(';').next()?.trim();
    if pair.contains('=') {
        Some(pair.to_string())
    } else {
        None
    }
}
