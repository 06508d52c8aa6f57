//! # Error Handling
//!
//! Client-side error taxonomy for calls against the AdLaunch backend. The
//! backend reports failures as non-2xx responses carrying a JSON body with
//! a `detail` or `error` field; [`ApiError::backend`] extracts that message
//! so callers can surface it verbatim, with a per-call fallback when the
//! body carries neither.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum length of a response body snippet embedded in an error message.
const BODY_SNIPPET_MAX_CHARS: usize = 200;

/// Errors produced by the HTTP client layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (DNS, connect, TLS, timeout). The
    /// reqwest error text already names the URL.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Backend { status: StatusCode, message: String },

    /// A 2xx response whose body did not match the documented shape.
    #[error("unexpected response from {endpoint}: {detail} (body: {body_snippet})")]
    Decode {
        endpoint: String,
        detail: String,
        body_snippet: String,
    },
}

impl ApiError {
    /// Build a backend error from a non-2xx response body.
    ///
    /// Prefers the body's `detail` field, then `error`, then the supplied
    /// per-call fallback message.
    pub fn backend(status: StatusCode, body: &str, fallback: &str) -> Self {
        let message = extract_backend_message(body).unwrap_or_else(|| fallback.to_string());
        Self::Backend { status, message }
    }

    /// Build a decode error for an unparseable 2xx body.
    pub fn decode(endpoint: &str, detail: impl std::fmt::Display, body: &str) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            detail: detail.to_string(),
            body_snippet: snippet(body),
        }
    }

    /// HTTP status of a backend-reported failure, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Extract the human-readable message from a backend error body.
fn extract_backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Truncate a body for inclusion in an error message, on character
/// boundaries so multi-byte content cannot split.
fn snippet(body: &str) -> String {
    if body.chars().count() > BODY_SNIPPET_MAX_CHARS {
        let truncated: String = body.chars().take(BODY_SNIPPET_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_prefers_detail_field() {
        let err = ApiError::backend(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Invalid URL format", "error": "ignored"}"#,
            "Failed to start analysis",
        );
        assert_eq!(err.to_string(), "Invalid URL format");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn backend_falls_back_to_error_field() {
        let err = ApiError::backend(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "generation quota exceeded"}"#,
            "Failed to start analysis",
        );
        assert_eq!(err.to_string(), "generation quota exceeded");
    }

    #[test]
    fn backend_uses_fallback_for_unreadable_body() {
        for body in ["", "<html>gateway timeout</html>", r#"{"detail": 42}"#] {
            let err = ApiError::backend(
                StatusCode::BAD_GATEWAY,
                body,
                "Failed to start analysis",
            );
            assert_eq!(err.to_string(), "Failed to start analysis");
        }
    }

    #[test]
    fn decode_truncates_long_bodies_on_char_boundaries() {
        let body = "测试中文字符 emoji 🚀 ".repeat(40);
        let err = ApiError::decode("/jobs/j1", "missing field `status`", &body);
        let ApiError::Decode { body_snippet, .. } = &err else {
            panic!("expected decode error");
        };
        assert!(body_snippet.chars().count() <= BODY_SNIPPET_MAX_CHARS + 3);
        assert!(body_snippet.ends_with("..."));
    }

    #[test]
    fn transport_has_no_status() {
        // A decode error stands in; only Backend carries a status.
        let err = ApiError::decode("/jobs/j1", "eof", "");
        assert_eq!(err.status(), None);
    }
}
