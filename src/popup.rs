//! # Popup Transport
//!
//! The OAuth handshake finishes in a browser window the client cannot
//! own, so the window sits behind the [`PopupLauncher`] trait: `open`
//! yields a [`PopupHandle`] carrying a tagged message channel (the
//! authoritative outcome) and a closed-yet flag (the fallback signal).
//!
//! The production launcher spawns the configured popup command (by
//! default the platform browser opener) and relays JSON lines from its
//! stdout as messages; process exit flips the closed flag. A plain
//! browser opener never writes messages and exits immediately, which
//! lands the flow in the coordinator's closed-popup fallback path.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of the message channel; a popup sends one or two messages.
const MESSAGE_BUFFER: usize = 8;

/// Tagged messages a popup can post back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PopupMessage {
    #[serde(rename = "FB_AUTH_SUCCESS")]
    AuthSuccess { session_id: String },
    #[serde(rename = "FB_AUTH_ERROR")]
    AuthError { error: String },
}

/// Errors opening a popup.
#[derive(Debug, Error)]
pub enum PopupError {
    /// No window or process could be produced at all.
    #[error("popup blocked: {detail}")]
    Blocked { detail: String },
}

/// Handle to an open popup.
pub struct PopupHandle {
    messages: mpsc::Receiver<PopupMessage>,
    closed: Arc<AtomicBool>,
}

impl PopupHandle {
    /// Assemble a handle from its raw parts. Scripted launchers in tests
    /// keep the sender and the flag.
    pub fn new(messages: mpsc::Receiver<PopupMessage>, closed: Arc<AtomicBool>) -> Self {
        Self { messages, closed }
    }

    /// Next tagged message, or `None` once the popup can send no more.
    pub async fn recv(&mut self) -> Option<PopupMessage> {
        self.messages.recv().await
    }

    /// Whether the popup has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for PopupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Something that can open the OAuth popup.
#[async_trait]
pub trait PopupLauncher: Send + Sync {
    async fn open(&self, url: &str) -> Result<PopupHandle, PopupError>;
}

/// Launcher that spawns an external command with the URL as its final
/// argument.
#[derive(Debug, Clone, Default)]
pub struct CommandPopupLauncher {
    command: Option<String>,
}

impl CommandPopupLauncher {
    /// Uses the platform browser opener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given command line, split on whitespace, with the URL
    /// appended.
    pub fn with_command(command: String) -> Self {
        Self {
            command: Some(command),
        }
    }

    fn build_command(&self, url: &str) -> Result<Command, PopupError> {
        let parts: Vec<&str> = match &self.command {
            Some(custom) => custom.split_whitespace().collect(),
            None => default_opener(),
        };
        let Some((program, args)) = parts.split_first() else {
            return Err(PopupError::Blocked {
                detail: "popup command is empty".to_string(),
            });
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        Ok(command)
    }
}

fn default_opener() -> Vec<&'static str> {
    if cfg!(target_os = "macos") {
        vec!["open"]
    } else if cfg!(target_os = "windows") {
        vec!["cmd", "/C", "start"]
    } else {
        vec!["xdg-open"]
    }
}

#[async_trait]
impl PopupLauncher for CommandPopupLauncher {
    async fn open(&self, url: &str) -> Result<PopupHandle, PopupError> {
        let mut command = self.build_command(url)?;
        let mut child = command.spawn().map_err(|err| PopupError::Blocked {
            detail: err.to_string(),
        })?;
        debug!(url, "opened popup process");

        let stdout = child.stdout.take();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&closed);
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);

        tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match serde_json::from_str::<PopupMessage>(&line) {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        // Openers print all sorts of things; only tagged
                        // messages count.
                        Err(_) => debug!(line = %line, "ignoring popup output line"),
                    }
                }
            }
            match child.wait().await {
                Ok(status) => debug!(code = ?status.code(), "popup process exited"),
                Err(err) => warn!(error = %err, "failed to reap popup process"),
            }
            closed_flag.store(true, Ordering::SeqCst);
        });

        Ok(PopupHandle::new(rx, closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn messages_decode_the_posted_payloads() {
        let success: PopupMessage =
            serde_json::from_str(r#"{"type": "FB_AUTH_SUCCESS", "session_id": "s-1"}"#).unwrap();
        assert_eq!(
            success,
            PopupMessage::AuthSuccess {
                session_id: "s-1".into()
            }
        );

        let error: PopupMessage =
            serde_json::from_str(r#"{"type": "FB_AUTH_ERROR", "error": "access_denied"}"#).unwrap();
        assert_eq!(
            error,
            PopupMessage::AuthError {
                error: "access_denied".into()
            }
        );
    }

    #[test]
    fn unrelated_messages_do_not_decode() {
        assert!(serde_json::from_str::<PopupMessage>(r#"{"type": "PING"}"#).is_err());
        assert!(serde_json::from_str::<PopupMessage>("not json").is_err());
    }

    #[tokio::test]
    async fn scripted_handle_delivers_messages() {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));
        let mut handle = PopupHandle::new(rx, Arc::clone(&closed));

        tx.send(PopupMessage::AuthSuccess {
            session_id: "s-9".into(),
        })
        .await
        .unwrap();
        assert_eq!(
            handle.recv().await,
            Some(PopupMessage::AuthSuccess {
                session_id: "s-9".into()
            })
        );

        drop(tx);
        assert_eq!(handle.recv().await, None);
        assert!(!handle.is_closed());
        closed.store(true, Ordering::SeqCst);
        assert!(handle.is_closed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_launcher_relays_stdout_and_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("popup.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'noise the opener prints'\nprintf '%s\\n' '{\"type\":\"FB_AUTH_SUCCESS\",\"session_id\":\"s-echo\"}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let launcher = CommandPopupLauncher::with_command(script.display().to_string());
        let mut handle = launcher.open("http://localhost:1/auth").await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), handle.recv())
            .await
            .unwrap();
        assert_eq!(
            message,
            Some(PopupMessage::AuthSuccess {
                session_id: "s-echo".into()
            })
        );

        // Channel drains, then the exit flips the closed flag.
        assert_eq!(handle.recv().await, None);
        for _ in 0..200 {
            if handle.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn missing_program_is_popup_blocked() {
        let launcher =
            CommandPopupLauncher::with_command("/nonexistent/adlaunch-popup-helper".to_string());
        let err = launcher.open("http://localhost:1/auth").await.unwrap_err();
        assert!(err.to_string().starts_with("popup blocked:"));
    }

    #[test]
    fn empty_command_is_popup_blocked() {
        let launcher = CommandPopupLauncher::with_command("   ".to_string());
        let err = launcher.build_command("http://x").unwrap_err();
        assert!(matches!(err, PopupError::Blocked { .. }));
    }
}
