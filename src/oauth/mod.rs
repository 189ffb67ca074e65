//! OAuth 2.0 authorization-code flow with refresh.
//!
//! Lifecycle of one connector identity:
//! 1. `build_authorization_url` stores a state nonce and returns the provider URL
//! 2. The user authorizes on the provider's site
//! 3. `exchange_code_for_token` checks the nonce and stores the token
//! 4. `get_access_token` hands out the token, refreshing it once expired
//!
//! ```text
//! Unauthenticated → AuthorizationRequested → Authenticated ⇄ Expired/Refreshing
//! ```

mod exchange;
mod provider;
mod state;

pub use provider::OAuthProviderConfig;
pub use state::{AuthorizationCallback, AuthorizationState};

use crate::credentials::{OAuthToken, SecretStore};
use crate::error::{FetchError, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the OAuth token of one connector identity.
///
/// The token is only ever read from and written to the injected
/// [`SecretStore`], under [`TokenManager::identity`]. Refreshes are
/// single-flight: concurrent callers that observe the same expired token wait
/// for one refresh instead of each spending the refresh token.
pub struct TokenManager {
    identity: String,
    provider: OAuthProviderConfig,
    store: Arc<dyn SecretStore>,
    http_client: reqwest::Client,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl TokenManager {
    pub fn new(
        identity: impl Into<String>,
        provider: OAuthProviderConfig,
        store: Arc<dyn SecretStore>,
    ) -> Self {
        Self::with_http_client(identity, provider, store, reqwest::Client::new())
    }

    pub fn with_http_client(
        identity: impl Into<String>,
        provider: OAuthProviderConfig,
        store: Arc<dyn SecretStore>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            identity: identity.into(),
            provider,
            store,
            http_client,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Key under which state and token are persisted.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn provider(&self) -> &OAuthProviderConfig {
        &self.provider
    }

    /// Build the provider authorization URL and persist a fresh state nonce.
    ///
    /// The nonce is merged into the stored document, so a token that is still
    /// valid keeps working until the new authorization completes.
    pub fn build_authorization_url(&self) -> Result<String> {
        let auth_state = AuthorizationState::generate();

        let mut document = match self.load_document()? {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        document.insert("state".to_string(), Value::String(auth_state.state.clone()));
        self.save_document(&Value::Object(document))?;

        debug!(identity = %self.identity, "Authorization state stored");
        Ok(self.provider.build_auth_url(&auth_state.state))
    }

    /// Validate the provider redirect and exchange its code for a token.
    ///
    /// Fails with [`FetchError::AuthMismatch`] without touching the store when
    /// the returned `state` is not the one persisted by
    /// [`build_authorization_url`](Self::build_authorization_url). Storing the
    /// token replaces the document, which consumes the nonce.
    pub async fn exchange_code_for_token(&self, authorization_response: &str) -> Result<()> {
        let (code, returned_state) =
            AuthorizationCallback::parse(authorization_response)?.into_grant()?;

        let expected = self
            .load_document()?
            .as_ref()
            .and_then(AuthorizationState::from_document);

        match expected {
            Some(expected) if expected.state == returned_state => {}
            _ => {
                warn!(identity = %self.identity, "OAuth state mismatch, refusing token exchange");
                return Err(FetchError::AuthMismatch(self.identity.clone()));
            }
        }

        let token = exchange::exchange_code_for_token(&self.http_client, &self.provider, &code)
            .await?;
        self.persist_token(&token)?;

        info!(
            identity = %self.identity,
            has_refresh_token = token.refresh_token.is_some(),
            "OAuth flow completed successfully"
        );
        Ok(())
    }

    /// Return a usable access token, refreshing it first if it has expired.
    ///
    /// No network call happens unless the stored token is expired.
    pub async fn get_access_token(&self) -> Result<String> {
        let token = self.require_token()?;
        if !token.is_expired() {
            return Ok(token.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while this one waited for the lock.
        let token = self.require_token()?;
        if !token.is_expired() {
            debug!(identity = %self.identity, "Token refreshed by a concurrent caller");
            return Ok(token.access_token);
        }

        let refresh_token = token
            .refresh_token
            .ok_or_else(|| FetchError::NoRefreshToken(self.identity.clone()))?;

        info!(identity = %self.identity, "Refreshing OAuth token");
        let refreshed =
            exchange::refresh_access_token(&self.http_client, &self.provider, &refresh_token)
                .await?;
        self.persist_token(&refreshed)?;
        info!(identity = %self.identity, "OAuth token refreshed successfully");

        Ok(refreshed.access_token)
    }

    /// The stored token, if any, without refreshing it.
    pub fn stored_token(&self) -> Result<Option<OAuthToken>> {
        let Some(document) = self.load_document()? else {
            return Ok(None);
        };

        // A document holding only a pending state (or a cleared token) is
        // not a credential.
        let has_access_token = document
            .get("access_token")
            .and_then(|t| t.as_str())
            .is_some_and(|t| !t.is_empty());
        if !has_access_token {
            return Ok(None);
        }

        serde_json::from_value(document)
            .map(Some)
            .map_err(|e| FetchError::MalformedResponse(format!("stored token: {}", e)))
    }

    fn require_token(&self) -> Result<OAuthToken> {
        self.stored_token()?
            .ok_or_else(|| FetchError::NoCredentials(self.identity.clone()))
    }

    fn persist_token(&self, token: &OAuthToken) -> Result<()> {
        let document = serde_json::to_value(token)
            .map_err(|e| FetchError::SecretStore(anyhow::Error::new(e)))?;
        self.save_document(&document)
    }

    fn load_document(&self) -> Result<Option<Value>> {
        self.store
            .load(&self.identity)
            .map_err(FetchError::SecretStore)
    }

    fn save_document(&self, document: &Value) -> Result<()> {
        self.store
            .save(&self.identity, document)
            .map_err(FetchError::SecretStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemorySecretStore;
    use chrono::{Duration, Utc};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn provider(token_url: String) -> OAuthProviderConfig {
        OAuthProviderConfig {
            auth_url: "https://provider.example/oauth/authorize".to_string(),
            token_url,
            scopes: vec!["public_api".to_string()],
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            redirect_uri: "https://redirect.me/".to_string(),
        }
    }

    fn manager(store: &Arc<MemorySecretStore>, token_url: String) -> TokenManager {
        TokenManager::new("test", provider(token_url), store.clone())
    }

    fn state_param(url: &str) -> String {
        let (_, query) = url.split_once('?').unwrap();
        let params: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap();
        params
            .into_iter()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v)
            .unwrap()
    }

    #[test]
    fn test_build_authorization_url_persists_state() {
        let store = Arc::new(MemorySecretStore::new());
        let tm = manager(&store, "http://unused/token".to_string());

        let url = tm.build_authorization_url().unwrap();
        assert!(url.starts_with("https://provider.example/oauth/authorize?"));
        assert!(url.contains("client_id=test_client_id"));

        let stored = store.load("test").unwrap().unwrap();
        assert_eq!(stored["state"], state_param(&url));
    }

    #[tokio::test]
    async fn test_build_authorization_url_keeps_valid_token() {
        let store = Arc::new(MemorySecretStore::new());
        store
            .save("test", &json!({"access_token": "still-good"}))
            .unwrap();
        let tm = manager(&store, "http://unused/token".to_string());

        tm.build_authorization_url().unwrap();
        assert_eq!(tm.get_access_token().await.unwrap(), "still-good");
    }

    #[tokio::test]
    async fn test_exchange_code_for_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("code".into(), "abc".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"issued","refresh_token":"r","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let tm = manager(&store, format!("{}/token", server.url()));
        let url = tm.build_authorization_url().unwrap();
        let state = state_param(&url);

        tm.exchange_code_for_token(&format!("https://redirect.me/?code=abc&state={}", state))
            .await
            .unwrap();

        let stored = store.load("test").unwrap().unwrap();
        assert_eq!(stored["access_token"], "issued");
        assert_eq!(stored["refresh_token"], "r");
        assert!(stored.get("state").is_none());
        mock.assert_async().await;

        // The nonce is single-use
        let err = tm
            .exchange_code_for_token(&format!("https://redirect.me/?code=abc&state={}", state))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::AuthMismatch(_)));
    }

    #[tokio::test]
    async fn test_exchange_state_mismatch_persists_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let tm = manager(&store, format!("{}/token", server.url()));
        tm.build_authorization_url().unwrap();
        let before = store.load("test").unwrap();

        let err = tm
            .exchange_code_for_token("https://redirect.me/?code=abc&state=forged")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::AuthMismatch(_)));
        assert_eq!(store.load("test").unwrap(), before);
        assert!(tm.stored_token().unwrap().is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_without_pending_state_is_mismatch() {
        let store = Arc::new(MemorySecretStore::new());
        let tm = manager(&store, "http://unused/token".to_string());

        let err = tm
            .exchange_code_for_token("https://redirect.me/?code=abc&state=whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::AuthMismatch(_)));
    }

    #[tokio::test]
    async fn test_get_access_token_without_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let tm = manager(&store, format!("{}/token", server.url()));
        let err = tm.get_access_token().await.unwrap_err();
        assert!(matches!(err, FetchError::NoCredentials(ref id) if id == "test"));

        // A cleared token counts as missing too
        store.save("test", &json!({"access_token": null})).unwrap();
        let err = tm.get_access_token().await.unwrap_err();
        assert!(matches!(err, FetchError::NoCredentials(_)));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_access_token_valid_token_no_refresh() {
        let store = Arc::new(MemorySecretStore::new());
        let expires_at = (Utc::now() + Duration::hours(1)).timestamp();
        store
            .save(
                "test",
                &json!({"access_token": "current", "refresh_token": "r", "expires_at": expires_at}),
            )
            .unwrap();

        let tm = manager(&store, "http://127.0.0.1:9/token".to_string());
        assert_eq!(tm.get_access_token().await.unwrap(), "current");
    }

    #[tokio::test]
    async fn test_get_access_token_refreshes_expired_token_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "old_refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new_token","refresh_token":"new_refresh","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let expired = (Utc::now() - Duration::seconds(10)).timestamp();
        store
            .save(
                "test",
                &json!({"access_token": "old", "refresh_token": "old_refresh", "expires_at": expired}),
            )
            .unwrap();

        let tm = manager(&store, format!("{}/token", server.url()));
        assert_eq!(tm.get_access_token().await.unwrap(), "new_token");

        let stored = store.load("test").unwrap().unwrap();
        assert_eq!(stored["access_token"], "new_token");
        assert_eq!(stored["refresh_token"], "new_refresh");

        // The refreshed token is not expired, so no second call happens
        assert_eq!(tm.get_access_token().await.unwrap(), "new_token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new_token","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemorySecretStore::new());
        let expired = (Utc::now() - Duration::seconds(10)).timestamp();
        store
            .save(
                "test",
                &json!({"access_token": "old", "refresh_token": "r", "expires_at": expired}),
            )
            .unwrap();

        let tm = manager(&store, format!("{}/token", server.url()));
        let (a, b) = tokio::join!(tm.get_access_token(), tm.get_access_token());
        assert_eq!(a.unwrap(), "new_token");
        assert_eq!(b.unwrap(), "new_token");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let store = Arc::new(MemorySecretStore::new());
        let expired = (Utc::now() - Duration::seconds(10)).timestamp();
        store
            .save("test", &json!({"access_token": "old", "expires_at": expired}))
            .unwrap();

        let tm = manager(&store, "http://127.0.0.1:9/token".to_string());
        let err = tm.get_access_token().await.unwrap_err();
        assert!(matches!(err, FetchError::NoRefreshToken(_)));
    }

    #[tokio::test]
    async fn test_identities_do_not_interfere() {
        let store = Arc::new(MemorySecretStore::new());
        store.save("a", &json!({"access_token": "token-a"})).unwrap();

        let a = TokenManager::new("a", provider("http://unused".to_string()), store.clone());
        let b = TokenManager::new("b", provider("http://unused".to_string()), store.clone());

        b.build_authorization_url().unwrap();
        assert_eq!(a.get_access_token().await.unwrap(), "token-a");
        assert!(matches!(
            b.get_access_token().await.unwrap_err(),
            FetchError::NoCredentials(_)
        ));
    }
}
