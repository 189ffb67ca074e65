// End-to-end: OAuth dance against a mock provider, encrypted token storage on
// disk, then paginated fetches over real HTTP.

use base64::{engine::general_purpose, Engine as _};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tabula::credentials::{SecretStore, SqliteSecretStore};
use tabula::fetch::{PageRequest, QueryBuilder};
use tabula::{
    FetchConfig, FetchEngine, FetchError, FormatterRegistry, OAuthProviderConfig, ResultAssembler,
    Row, Schema, TokenManager,
};
use tempfile::TempDir;

struct ItemsQuery {
    base_url: String,
}

impl QueryBuilder for ItemsQuery {
    fn page_url(&self, request: &PageRequest) -> String {
        format!(
            "{}/{}?per_page={}&page={}",
            self.base_url,
            request.dataset,
            request.per_page,
            request.page_number()
        )
    }
}

fn encryption_key() -> String {
    general_purpose::STANDARD.encode([7u8; 32])
}

fn provider(server: &ServerGuard) -> OAuthProviderConfig {
    OAuthProviderConfig {
        auth_url: format!("{}/oauth/authorize", server.url()),
        token_url: format!("{}/oauth/token", server.url()),
        scopes: vec!["read".to_string()],
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "https://redirect.me/".to_string(),
    }
}

fn item_row(record: &Value) -> tabula::Result<Vec<Row>> {
    let mut row = Row::new();
    row.insert("id".to_string(), record["id"].clone());
    row.insert("label".to_string(), record["label"].clone());
    Ok(vec![row])
}

fn engine(server: &ServerGuard, store: Arc<dyn SecretStore>) -> FetchEngine {
    let tokens = Arc::new(TokenManager::new("items-prod", provider(server), store));
    let registry = FormatterRegistry::new(["items"]).with("items", item_row).unwrap();
    let assembler = ResultAssembler::new().with_schema("items", Schema::new(["id", "label"]));
    let config = FetchConfig {
        page_size: 2,
        backoff_ms: 1,
        ..FetchConfig::default()
    };
    FetchEngine::new(
        tokens,
        Arc::new(ItemsQuery {
            base_url: server.url(),
        }),
        registry,
        assembler,
        config,
    )
}

async fn mock_items_page(server: &mut ServerGuard, page: u64, last: bool, token: &str) -> mockito::Mock {
    let next = if last {
        Value::Null
    } else {
        json!(format!("{}/items?page={}", server.url(), page + 1))
    };
    let body = json!({
        "meta": {"next_page_link": next, "current_page": page},
        "items": [
            {"id": page * 10 + 1, "label": format!("item {}a", page)},
            {"id": page * 10 + 2, "label": format!("item {}b", page)}
        ]
    });
    server
        .mock("GET", format!("/items?per_page=2&page={}", page).as_str())
        .match_header("authorization", format!("Bearer {}", token).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
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

#[tokio::test]
async fn test_authorize_then_fetch_every_page() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("secrets.db");

    let token_mock = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "authorization_code".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"issued","refresh_token":"refresh","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(SqliteSecretStore::new(&db_path, &encryption_key()).unwrap());
    let engine = engine(&server, store);

    let auth_url = engine.token_manager().build_authorization_url().unwrap();
    let callback = format!(
        "https://redirect.me/?code=abc&state={}",
        state_param(&auth_url)
    );
    engine
        .token_manager()
        .exchange_code_for_token(&callback)
        .await
        .unwrap();
    token_mock.assert_async().await;

    let mut pages = Vec::new();
    for page in 1..=3 {
        pages.push(mock_items_page(&mut server, page, page == 3, "issued").await);
    }

    let items = engine.fetch("items", -1).await.unwrap();
    assert_eq!(items.columns, vec!["id", "label"]);
    assert_eq!(items.len(), 6);
    assert_eq!(items.rows[5], vec![json!(32), json!("item 3b")]);
    for page in pages {
        page.assert_async().await;
    }

    // The token survives a fresh store over the same file
    let reopened = SqliteSecretStore::new(&db_path, &encryption_key()).unwrap();
    let stored = reopened.load("items-prod").unwrap().unwrap();
    assert_eq!(stored["access_token"], "issued");
}

#[tokio::test]
async fn test_expired_token_refreshes_once_then_fetches() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteSecretStore::new(dir.path().join("secrets.db"), &encryption_key()).unwrap(),
    );
    store
        .save(
            "items-prod",
            &json!({
                "access_token": "stale",
                "refresh_token": "refresh",
                "expires_at": chrono::Utc::now().timestamp() - 10
            }),
        )
        .unwrap();

    let refresh_mock = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"renewed","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;
    let page = mock_items_page(&mut server, 1, false, "renewed").await;

    let engine = engine(&server, store.clone());
    let items = engine.fetch("items", 1).await.unwrap();

    assert_eq!(items.len(), 2);
    refresh_mock.assert_async().await;
    page.assert_async().await;

    let stored = store.load("items-prod").unwrap().unwrap();
    assert_eq!(stored["access_token"], "renewed");
    // The provider did not rotate the refresh token
    assert_eq!(stored["refresh_token"], "refresh");
}

#[tokio::test]
async fn test_expired_token_without_refresh_token() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteSecretStore::new(dir.path().join("secrets.db"), &encryption_key()).unwrap(),
    );
    store
        .save(
            "items-prod",
            &json!({"access_token": "stale", "expires_at": chrono::Utc::now().timestamp() - 10}),
        )
        .unwrap();

    let engine = engine(&server, store);
    let err = engine.fetch("items", -1).await.unwrap_err();
    assert!(matches!(err, FetchError::NoRefreshToken(_)));
    assert!(err.is_auth());
}
