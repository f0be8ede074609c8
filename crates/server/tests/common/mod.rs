//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::{TestResponse, TestServer};
use base64::Engine;
use migration::{Migrator, MigratorTrait};
use oauth2_server::api::build_router;
use oauth2_server::config::OAuth2Config;
use oauth2_server::model::NewClient;
use oauth2_server::oauth2::OAuth2Server;
use oauth2_server::store::{DbStorage, Storage};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use url::Url;

pub const CLIENT_ID: &str = "1234";
pub const CLIENT_SECRET: &str = "aabbccdd";
pub const REDIRECT_URI: &str = "http://x/callback";
pub const USERNAME: &str = "test";
pub const PASSWORD: &str = "test";

pub struct TestApp {
    pub server: TestServer,
    pub storage: DbStorage,
    pub user_id: String,
}

/// Fresh in-memory database with every migration applied.
pub async fn test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");
    Arc::new(db)
}

pub async fn setup() -> TestApp {
    setup_with(OAuth2Config::default()).await
}

/// Router over a database holding client 1234 and user test/test.
pub async fn setup_with(config: OAuth2Config) -> TestApp {
    let db = test_db().await;
    let storage = DbStorage::new(db.clone());
    storage
        .create_client(NewClient {
            id: Some(CLIENT_ID.to_string()),
            secret: Some(CLIENT_SECRET.to_string()),
            name: "Test client".to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            owner_id: "owner".to_string(),
            public: false,
        })
        .await
        .expect("create client");
    let user_id = storage
        .create_user(USERNAME, PASSWORD)
        .await
        .expect("create user");

    let app = build_router(OAuth2Server::with_database(config, db), None);
    TestApp {
        server: TestServer::new(app).expect("create test server"),
        storage,
        user_id,
    }
}

pub fn basic_auth(client_id: &str, secret: &str) -> (HeaderName, HeaderValue) {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{client_id}:{secret}"));
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).expect("header value"),
    )
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
    )
}

pub fn location(response: &TestResponse) -> Url {
    let value = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header");
    Url::parse(value).expect("absolute location")
}

pub fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn fragment_value(url: &Url, name: &str) -> Option<String> {
    let fragment = url.fragment()?;
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Run the code flow through the login form and return the issued code.
pub async fn obtain_code(server: &TestServer) -> String {
    let response = server
        .post("/authorize")
        .form(&[
            ("response_type", "code"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("scope", "everything"),
            ("state", "xyz"),
            ("login", USERNAME),
            ("password", PASSWORD),
        ])
        .await;
    response.assert_status(axum::http::StatusCode::FOUND);
    query_value(&location(&response), "code").expect("code in redirect")
}

/// Exchange a code with Basic client authentication.
pub async fn exchange_code(server: &TestServer, code: &str) -> TestResponse {
    let (name, value) = basic_auth(CLIENT_ID, CLIENT_SECRET);
    server
        .post("/token")
        .add_header(name, value)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
        ])
        .await
}

pub async fn client_credentials_token(server: &TestServer) -> String {
    let (name, value) = basic_auth(CLIENT_ID, CLIENT_SECRET);
    let response = server
        .post("/token")
        .add_header(name, value)
        .form(&[("grant_type", "client_credentials"), ("scope", "everything")])
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["access_token"].as_str().expect("access_token").to_string()
}
