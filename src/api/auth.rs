//! Account auth endpoints
//!
//! Cookie-session auth: login and register capture the session cookie from
//! the response, logout drops it locally whatever the backend said.

use tracing::{debug, instrument};

use super::ApiClient;
use crate::error::ApiError;
use crate::models::{LoginRequest, RegisterRequest, User};

impl ApiClient {
    /// `POST /auth/login`: sign in and capture the session cookie.
    #[instrument(skip_all)]
    pub async fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        self.execute_capturing_cookie(
            self.post("/auth/login").json(request),
            "/auth/login",
            "Login failed",
        )
        .await
    }

    /// `POST /auth/register`: create an account; the backend signs the new
    /// account in, so the session cookie is captured here too.
    #[instrument(skip_all)]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.execute_capturing_cookie(
            self.post("/auth/register").json(request),
            "/auth/register",
            "Registration failed",
        )
        .await
    }

    /// `GET /auth/me`: the signed-in user for the current session cookie.
    #[instrument(skip_all)]
    pub async fn me(&self) -> Result<User, ApiError> {
        self.execute(self.get("/auth/me"), "/auth/me", "Not signed in")
            .await
    }

    /// `POST /auth/logout`: end the backend session. The local cookie is
    /// dropped even when the request fails.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .execute_no_content(self.post("/auth/logout"), "/auth/logout", "Logout failed")
            .await;
        if let Err(err) = &result {
            debug!(error = %err, "logout request failed; clearing local session anyway");
        }
        self.set_session_cookie(None);
        result
    }
}
