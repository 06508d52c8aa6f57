//! Shared helpers for integration tests: a mock-backed API client, an
//! in-memory session store, and a popup launcher driven by a script
//! instead of a browser.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adlaunch::api::ApiClient;
use adlaunch::popup::{PopupError, PopupHandle, PopupLauncher, PopupMessage};
use adlaunch::store::{MemoryStorage, SessionStore};
use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;
use wiremock::MockServer;

pub fn api_client(server: &MockServer) -> ApiClient {
    ApiClient::new(Url::parse(&server.uri()).unwrap()).unwrap()
}

pub fn memory_store(ttl: Duration) -> SessionStore {
    SessionStore::new(Arc::new(MemoryStorage::new()), ttl)
}

/// One scripted popup behavior per `open` call.
pub enum PopupScript {
    /// `open` fails the way a blocked window does.
    Blocked,
    /// Deliver the messages after the delay, then optionally mark the
    /// window closed.
    Deliver {
        after: Duration,
        messages: Vec<PopupMessage>,
        close: bool,
    },
    /// Close after the delay without posting anything.
    CloseSilently { after: Duration },
    /// Stay open forever without posting.
    Hang,
}

/// Popup launcher that replays a prewritten script.
pub struct ScriptedPopupLauncher {
    script: Mutex<VecDeque<PopupScript>>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedPopupLauncher {
    pub fn new(script: Vec<PopupScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// URLs passed to `open`, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl PopupLauncher for ScriptedPopupLauncher {
    async fn open(&self, url: &str) -> Result<PopupHandle, PopupError> {
        self.opened.lock().unwrap().push(url.to_string());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PopupScript::Hang);

        match step {
            PopupScript::Blocked => Err(PopupError::Blocked {
                detail: "scripted block".to_string(),
            }),
            PopupScript::Deliver {
                after,
                messages,
                close,
            } => {
                let (tx, rx) = mpsc::channel(8);
                let closed = Arc::new(AtomicBool::new(false));
                let flag = Arc::clone(&closed);
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    for message in messages {
                        let _ = tx.send(message).await;
                    }
                    if close {
                        flag.store(true, Ordering::SeqCst);
                    }
                });
                Ok(PopupHandle::new(rx, closed))
            }
            PopupScript::CloseSilently { after } => {
                let (tx, rx) = mpsc::channel(8);
                let closed = Arc::new(AtomicBool::new(false));
                let flag = Arc::clone(&closed);
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    flag.store(true, Ordering::SeqCst);
                    drop(tx);
                });
                Ok(PopupHandle::new(rx, closed))
            }
            PopupScript::Hang => {
                let (tx, rx) = mpsc::channel(8);
                tokio::spawn(async move {
                    // Keep the sender alive so the channel never closes.
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(tx);
                });
                Ok(PopupHandle::new(rx, Arc::new(AtomicBool::new(false))))
            }
        }
    }
}
