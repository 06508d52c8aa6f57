//! # Session/State Store
//!
//! A small TTL-bounded key-value cache that keeps the working campaign
//! draft alive across CLI invocations without server round-trips. Values
//! are wrapped in a `{ "value": …, "timestamp": ms }` envelope; reads
//! older than the TTL delete the entry and report absence. A legacy value
//! stored without the envelope is returned as-is rather than discarded.
//!
//! Storage failures are deliberately invisible to callers: any read or
//! write error is logged, counted, and treated as a cache miss. A broken
//! cache must never take a command down with it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Namespaced keys for everything the client persists.
pub mod keys {
    /// Analysis output for the current campaign (TTL-bounded)
    pub const AD_PACK: &str = "adlaunch.campaign.ad_pack";
    /// User-edited publish settings for the current campaign (TTL-bounded)
    pub const DRAFT: &str = "adlaunch.campaign.draft";
    /// Index of the chosen creative within the ad pack (TTL-bounded)
    pub const SELECTED_AD: &str = "adlaunch.campaign.selected_ad";
    /// Free-text input; session-scoped but never expires
    pub const INPUT: &str = "adlaunch.campaign.input";
    /// Id of the last analysis job whose result was consumed
    pub const LAST_JOB: &str = "adlaunch.campaign.last_job";
    /// Facebook session token
    pub const FB_SESSION: &str = "adlaunch.fb.session";
    /// Cached canonical Facebook connection status
    pub const FB_STATUS: &str = "adlaunch.fb.status";
    /// Account session cookie
    pub const ACCOUNT_COOKIE: &str = "adlaunch.account.cookie";

    /// Keys cleared by a session reset. Connection and account state
    /// survive; a new campaign is not a new identity.
    pub const SESSION_SCOPED: &[&str] = &[AD_PACK, DRAFT, SELECTED_AD, INPUT, LAST_JOB];
}

/// Errors a storage backend can report. The [`SessionStore`] swallows all
/// of them; they exist so backends can say what went wrong in logs.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable")]
    Unavailable,
}

/// Raw string key-value storage.
///
/// Values are opaque strings (in practice JSON documents); envelope and
/// TTL logic live a level up in [`SessionStore`].
pub trait Storage: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// TTL-enveloped cache over a [`Storage`] backend.
#[derive(Debug, Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    session_ttl: Duration,
}

impl SessionStore {
    /// Creates a store with the given backend and campaign-session TTL.
    pub fn new(storage: Arc<dyn Storage>, session_ttl: Duration) -> Self {
        Self {
            storage,
            session_ttl,
        }
    }

    /// The TTL applied to campaign-scoped values.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Store a value wrapped in a TTL envelope.
    pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T) {
        let envelope = serde_json::json!({
            "value": value,
            "timestamp": Utc::now().timestamp_millis(),
        });
        self.write(key, &envelope);
    }

    /// Read a value stored by [`set_with_ttl`](Self::set_with_ttl),
    /// honoring the given TTL. Expired entries are deleted and reported
    /// absent; a legacy non-enveloped value is returned as-is.
    pub fn get_with_ttl<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let raw = match self.storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!("adlaunch_store_misses_total").increment(1);
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, "storage read failed; treating as miss");
                counter!("adlaunch_store_errors_total").increment(1);
                return None;
            }
        };

        let parsed: JsonValue = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "stored value unreadable; treating as miss");
                counter!("adlaunch_store_errors_total").increment(1);
                return None;
            }
        };

        let (payload, timestamp) = match envelope_parts(parsed) {
            EnvelopeParts::Enveloped { value, timestamp } => (value, Some(timestamp)),
            EnvelopeParts::Legacy(value) => (value, None),
        };

        if let Some(timestamp) = timestamp {
            let age_ms = Utc::now().timestamp_millis().saturating_sub(timestamp);
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            if age_ms > ttl_ms {
                self.remove(key);
                counter!("adlaunch_store_expired_total").increment(1);
                return None;
            }
        }

        match serde_json::from_value(payload) {
            Ok(value) => {
                counter!("adlaunch_store_hits_total").increment(1);
                Some(value)
            }
            Err(err) => {
                warn!(key, error = %err, "stored value has unexpected shape; treating as miss");
                counter!("adlaunch_store_errors_total").increment(1);
                None
            }
        }
    }

    /// Read a campaign-scoped value with the configured session TTL.
    pub fn get_session_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with_ttl(key, self.session_ttl)
    }

    /// Store a value without an envelope; it never expires.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.write(key, &json),
            Err(err) => {
                warn!(key, error = %err, "value not serializable; dropping write");
                counter!("adlaunch_store_errors_total").increment(1);
            }
        }
    }

    /// Read a value stored by [`set`](Self::set).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        // No expiry: a plain value is just a legacy-shaped envelope.
        self.get_with_ttl(key, Duration::MAX)
    }

    /// Delete one key; failures are logged and ignored.
    pub fn remove(&self, key: &str) {
        if let Err(err) = self.storage.remove(key) {
            warn!(key, error = %err, "storage remove failed");
            counter!("adlaunch_store_errors_total").increment(1);
        }
    }

    /// Remove every campaign-scoped key immediately, independent of TTL.
    pub fn reset_session(&self) {
        for key in keys::SESSION_SCOPED {
            self.remove(key);
        }
        counter!("adlaunch_store_session_resets_total").increment(1);
    }

    fn write(&self, key: &str, value: &JsonValue) {
        let raw = value.to_string();
        if let Err(err) = self.storage.set(key, raw) {
            warn!(key, error = %err, "storage write failed; dropping value");
            counter!("adlaunch_store_errors_total").increment(1);
        }
    }
}

enum EnvelopeParts {
    Enveloped { value: JsonValue, timestamp: i64 },
    Legacy(JsonValue),
}

/// Split a stored document into envelope and payload. Only an object with
/// both `value` and a numeric `timestamp` counts as an envelope; anything
/// else is a legacy value.
fn envelope_parts(parsed: JsonValue) -> EnvelopeParts {
    match parsed {
        JsonValue::Object(mut map)
            if map.contains_key("value")
                && map.get("timestamp").and_then(JsonValue::as_i64).is_some() =>
        {
            let timestamp = map
                .get("timestamp")
                .and_then(JsonValue::as_i64)
                .unwrap_or_default();
            let value = map.remove("value").unwrap_or(JsonValue::Null);
            EnvelopeParts::Enveloped { value, timestamp }
        }
        other => EnvelopeParts::Legacy(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone(), Duration::from_secs(4 * 60 * 60));
        (storage, store)
    }

    #[test]
    fn round_trips_through_envelope() {
        let (_storage, store) = store();
        store.set_with_ttl(keys::INPUT, &"https://example.com".to_string());
        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(60));
        assert_eq!(value.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn expired_entry_is_deleted_and_absent() {
        let (storage, store) = store();
        let stale = serde_json::json!({
            "value": "old",
            "timestamp": Utc::now().timestamp_millis() - 10_000,
        });
        storage.set(keys::INPUT, stale.to_string()).unwrap();

        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(5));
        assert_eq!(value, None);
        // The expired entry is gone, not just hidden.
        assert_eq!(storage.get(keys::INPUT).unwrap(), None);
    }

    #[test]
    fn entry_within_ttl_survives() {
        let (storage, store) = store();
        let fresh = serde_json::json!({
            "value": "new",
            "timestamp": Utc::now().timestamp_millis() - 1_000,
        });
        storage.set(keys::INPUT, fresh.to_string()).unwrap();

        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(5));
        assert_eq!(value.as_deref(), Some("new"));
    }

    #[test]
    fn legacy_value_passes_through() {
        let (storage, store) = store();
        storage
            .set(keys::INPUT, "\"bare string\"".to_string())
            .unwrap();
        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(1));
        assert_eq!(value.as_deref(), Some("bare string"));
    }

    #[test]
    fn object_without_timestamp_is_legacy() {
        let (storage, store) = store();
        storage
            .set(keys::DRAFT, r#"{"value": "looks enveloped"}"#.to_string())
            .unwrap();
        // `value` alone is not an envelope; the whole object comes back.
        let value: Option<JsonValue> = store.get_with_ttl(keys::DRAFT, Duration::from_secs(1));
        assert_eq!(
            value,
            Some(serde_json::json!({"value": "looks enveloped"}))
        );
    }

    #[test]
    fn storage_failure_is_a_miss() {
        let (storage, store) = store();
        store.set_with_ttl(keys::INPUT, &"kept".to_string());
        storage.set_failing(true);
        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(60));
        assert_eq!(value, None);
        storage.set_failing(false);
        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(60));
        assert_eq!(value.as_deref(), Some("kept"));
    }

    #[test]
    fn write_failure_is_swallowed() {
        let (storage, store) = store();
        storage.set_failing(true);
        store.set_with_ttl(keys::INPUT, &"dropped".to_string());
        storage.set_failing(false);
        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(60));
        assert_eq!(value, None);
    }

    #[test]
    fn corrupt_value_is_a_miss() {
        let (storage, store) = store();
        storage.set(keys::INPUT, "{not json".to_string()).unwrap();
        let value: Option<String> = store.get_with_ttl(keys::INPUT, Duration::from_secs(60));
        assert_eq!(value, None);
    }

    #[test]
    fn reset_session_clears_only_campaign_keys() {
        let (_storage, store) = store();
        store.set_with_ttl(keys::AD_PACK, &serde_json::json!({"ads": []}));
        store.set_with_ttl(keys::SELECTED_AD, &0u32);
        store.set(keys::INPUT, &"https://example.com".to_string());
        store.set(keys::FB_SESSION, &"fb-token".to_string());
        store.set(keys::ACCOUNT_COOKIE, &"session=abc".to_string());

        store.reset_session();

        assert_eq!(store.get_session_value::<JsonValue>(keys::AD_PACK), None);
        assert_eq!(store.get_session_value::<u32>(keys::SELECTED_AD), None);
        assert_eq!(store.get::<String>(keys::INPUT), None);
        assert_eq!(store.get::<String>(keys::FB_SESSION).as_deref(), Some("fb-token"));
        assert_eq!(
            store.get::<String>(keys::ACCOUNT_COOKIE).as_deref(),
            Some("session=abc")
        );
    }
}
