//! # Facebook Connection Coordinator
//!
//! Drives the OAuth popup flow and keeps three places agreed on the
//! connection state: the backend (canonical), the persisted store, and
//! this coordinator's in-memory status.
//!
//! `connect` waits on two channels plus a deadline in one `select!` loop:
//! the popup's tagged message channel is authoritative; a 500 ms
//! close-detection tick is the fallback for popups that vanish without
//! posting; the configured timeout bounds the whole attempt. The select
//! is biased toward the message channel, so an outcome that was posted
//! before the popup closed always wins over the fallback.
//!
//! On success the ordering is strict: clear the old token and cached
//! status, store the new token, refetch canonical status, then replace
//! local state. Reordering opens a window where a reader sees the
//! previous session's data under the new token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use metrics::counter;
use reqwest::StatusCode;
use scopeguard::guard;
use thiserror::Error;
use tokio::time::{interval, sleep};
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::config::FacebookConfig;
use crate::error::ApiError;
use crate::models::FbStatus;
use crate::popup::{PopupError, PopupHandle, PopupLauncher, PopupMessage};
use crate::store::{SessionStore, keys};

/// Errors a connection attempt can surface.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The popup never opened.
    #[error("popup blocked: {detail}")]
    PopupBlocked { detail: String },

    /// The popup reported an explicit failure.
    #[error("Facebook login failed: {message}")]
    Auth { message: String },

    /// Fetching canonical status failed.
    #[error("Facebook status check failed: {source}")]
    StatusCheck {
        #[source]
        source: ApiError,
    },

    /// The attempt outlived the configured bound.
    #[error("Facebook connection timed out")]
    TimedOut,

    /// Another connect attempt is still running.
    #[error("a Facebook connection attempt is already in progress")]
    AlreadyConnecting,
}

impl From<PopupError> for ConnectError {
    fn from(err: PopupError) -> Self {
        match err {
            PopupError::Blocked { detail } => ConnectError::PopupBlocked { detail },
        }
    }
}

/// Coordinator for the Facebook connection lifecycle.
pub struct FacebookCoordinator {
    api: ApiClient,
    store: SessionStore,
    launcher: Arc<dyn PopupLauncher>,
    config: FacebookConfig,
    status: Arc<RwLock<FbStatus>>,
    connecting: Arc<AtomicBool>,
}

impl FacebookCoordinator {
    /// Creates a coordinator, hydrating the token and cached status from
    /// the store.
    pub fn new(
        api: ApiClient,
        store: SessionStore,
        launcher: Arc<dyn PopupLauncher>,
        config: FacebookConfig,
    ) -> Self {
        if let Some(token) = store.get::<String>(keys::FB_SESSION) {
            api.set_fb_session(Some(token));
        }
        let status = store
            .get::<FbStatus>(keys::FB_STATUS)
            .unwrap_or_else(FbStatus::disconnected);
        Self {
            api,
            store,
            launcher,
            config,
            status: Arc::new(RwLock::new(status)),
            connecting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The connection status as this coordinator last saw it.
    pub fn status(&self) -> FbStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one full connect attempt and return the resulting canonical
    /// status. An attempt that ends with the popup closed and no outcome
    /// posted can legitimately return a disconnected status.
    #[instrument(skip_all)]
    pub async fn connect(&self) -> Result<FbStatus, ConnectError> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConnectError::AlreadyConnecting);
        }
        let connecting = Arc::clone(&self.connecting);
        let _clear = guard((), move |_| connecting.store(false, Ordering::SeqCst));

        counter!("adlaunch_connect_attempts_total").increment(1);
        let url = self.api.facebook_login_url();
        info!(url = %url, "opening Facebook login popup");

        let handle = match self.launcher.open(&url).await {
            Ok(handle) => handle,
            Err(err) => {
                counter!("adlaunch_connect_popup_blocked_total").increment(1);
                return Err(err.into());
            }
        };

        self.wait_for_outcome(handle).await
    }

    async fn wait_for_outcome(&self, mut handle: PopupHandle) -> Result<FbStatus, ConnectError> {
        let deadline = sleep(Duration::from_secs(self.config.connect_timeout_secs));
        tokio::pin!(deadline);
        let mut close_tick = interval(Duration::from_millis(self.config.close_poll_ms));
        let mut channel_open = true;

        loop {
            tokio::select! {
                biased;

                message = handle.recv(), if channel_open => match message {
                    Some(PopupMessage::AuthSuccess { session_id }) => {
                        return self.complete_success(session_id).await;
                    }
                    Some(PopupMessage::AuthError { error }) => {
                        counter!("adlaunch_connect_auth_errors_total").increment(1);
                        warn!(error = %error, "popup reported auth failure");
                        // The previously stored token stays untouched.
                        return Err(ConnectError::Auth { message: error });
                    }
                    None => {
                        // Sender gone; only close detection remains.
                        channel_open = false;
                    }
                },

                _ = close_tick.tick() => {
                    if handle.is_closed() {
                        counter!("adlaunch_connect_fallback_total").increment(1);
                        debug!("popup closed without posting; falling back to status check");
                        return self.refresh_status().await;
                    }
                }

                _ = &mut deadline => {
                    counter!("adlaunch_connect_timeouts_total").increment(1);
                    warn!("connect attempt timed out");
                    return Err(ConnectError::TimedOut);
                }
            }
        }
    }

    /// Channel A success: clear old session, store the new token, refetch
    /// canonical status, replace local state. Order is load-bearing.
    async fn complete_success(&self, session_id: String) -> Result<FbStatus, ConnectError> {
        info!("popup reported auth success");
        self.purge_local();

        self.store.set(keys::FB_SESSION, &session_id);
        self.api.set_fb_session(Some(session_id));

        let status = self.refresh_status().await?;
        counter!("adlaunch_connect_success_total").increment(1);
        info!(
            connected = status.connected,
            pages = status.pages.len(),
            "connection established"
        );
        Ok(status)
    }

    /// One canonical status fetch with the current token (or none),
    /// replacing local state with the answer.
    #[instrument(skip_all)]
    pub async fn refresh_status(&self) -> Result<FbStatus, ConnectError> {
        match self.api.fb_status().await {
            Ok(status) => {
                if !status.connected && self.api.fb_session().is_some() {
                    // The backend does not recognize the stored token.
                    debug!("stored token rejected; purging local session");
                    self.purge_local();
                } else {
                    self.apply_status(status.clone());
                }
                Ok(status)
            }
            Err(err) if err.status() == Some(StatusCode::UNAUTHORIZED) => {
                debug!("status endpoint rejected the session; purging local state");
                self.purge_local();
                Ok(FbStatus::disconnected())
            }
            Err(source) => {
                counter!("adlaunch_connect_status_check_failures_total").increment(1);
                Err(ConnectError::StatusCheck { source })
            }
        }
    }

    /// Invalidate the backend session, then clear local state whatever the
    /// backend said. A failed network call must not leave a half-connected
    /// client behind.
    #[instrument(skip_all)]
    pub async fn disconnect(&self) {
        if let Err(err) = self.api.disconnect_facebook().await {
            warn!(error = %err, "backend disconnect failed; clearing local state anyway");
        }
        self.purge_local();
        counter!("adlaunch_disconnects_total").increment(1);
        info!("Facebook session cleared");
    }

    fn apply_status(&self, status: FbStatus) {
        self.store.set(keys::FB_STATUS, &status);
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn purge_local(&self) {
        self.api.set_fb_session(None);
        self.store.remove(keys::FB_SESSION);
        self.store.remove(keys::FB_STATUS);
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = FbStatus::disconnected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_message_names_the_cause() {
        let err = ConnectError::Auth {
            message: "access_denied".into(),
        };
        assert_eq!(err.to_string(), "Facebook login failed: access_denied");
    }

    #[test]
    fn popup_error_maps_to_popup_blocked() {
        let err: ConnectError = PopupError::Blocked {
            detail: "no display".into(),
        }
        .into();
        assert_eq!(err.to_string(), "popup blocked: no display");
    }
}
