//! Secret storage for OAuth state and tokens.
//!
//! The engine never reaches for process-wide storage: every [`TokenManager`]
//! receives an `Arc<dyn SecretStore>` at construction and addresses it with its
//! own connector identity, so two connector instances cannot overwrite each
//! other's secrets unless they share an identity.
//!
//! # Backends
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       SecretStore (trait)                │
//! │  save(key, json) / load(key)             │
//! └─────────────────────────────────────────┘
//!          ↓                    ↓
//!  MemorySecretStore     SqliteSecretStore
//!  (tests, embedding)    (AES-256-GCM at rest)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use tabula::credentials::{SecretStore, SqliteSecretStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encryption_key = std::env::var("TABULA_ENCRYPTION_KEY")?;
//! let store = SqliteSecretStore::new("secrets.db", &encryption_key)?;
//!
//! store.save("aircall-prod", &serde_json::json!({"access_token": "tok"}))?;
//! let doc = store.load("aircall-prod")?;
//! assert!(doc.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! [`TokenManager`]: crate::oauth::TokenManager

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

mod encryption;
mod storage;

pub use encryption::{Sealed, SecretCipher};
pub use storage::SqliteSecretStore;

/// Key/value persistence for secrets, keyed by connector identity.
///
/// `save` replaces whatever document was stored under the key.
pub trait SecretStore: Send + Sync {
    fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Returns `Ok(None)` when nothing was ever saved under `key`.
    fn load(&self, key: &str) -> Result<Option<Value>>;
}

/// In-process secret store. Contents are lost when the store is dropped.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, Value>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|_| anyhow!("secret store lock poisoned"))?;
        secrets.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|_| anyhow!("secret store lock poisoned"))?;
        Ok(secrets.get(key).cloned())
    }
}

/// OAuth2 token as persisted in the secret store.
///
/// `expires_at` is stored as epoch seconds so documents written by other
/// tooling (`{"access_token": .., "expires_at": 1700000000}`) load unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Credential sent as `Authorization: Bearer ..`
    pub access_token: String,

    /// Used to obtain a new access token once `expires_at` has passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(
        default,
        with = "epoch_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// `Option<DateTime<Utc>>` as epoch seconds.
///
/// Written as an integer. Reads accept integers and fractional seconds; the
/// fraction is truncated.
pub(crate) mod epoch_seconds_option {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_some(&at.timestamp()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(seconds) => from_seconds(seconds)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("epoch seconds out of range: {}", seconds))),
            None => Ok(None),
        }
    }

    pub fn from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
        if !seconds.is_finite() {
            return None;
        }
        DateTime::from_timestamp(seconds.trunc() as i64, 0)
    }
}

impl OAuthToken {
    /// Token with no expiry and no refresh token (personal access tokens).
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
            token_type: None,
        }
    }

    /// True once `expires_at` lies strictly before `now`. Tokens without an
    /// expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
