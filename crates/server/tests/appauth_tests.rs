//! Demo pages, with the authorization server played by wiremock.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::test_db;
use oauth2_server::config::AppConfig;
use oauth2_server::oauth2::appauth::{DemoState, router, seed_demo};
use oauth2_server::store::{CredentialVerifier, DbStorage, Storage};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("1234:aabbccdd")
const DEMO_BASIC: &str = "Basic MTIzNDphYWJiY2NkZA==";

fn demo_state(api_url: &str) -> DemoState {
    let mut config = AppConfig::with_database_url("sqlite::memory:");
    config.api_url = api_url.to_string();
    config.demo.enabled = true;
    DemoState::new(&config).expect("valid api_url")
}

async fn demo_server(mock: &MockServer) -> TestServer {
    TestServer::new(router(demo_state(&mock.uri()))).expect("create test server")
}

#[tokio::test]
async fn test_app_index_links_to_flows() {
    let server = TestServer::new(router(demo_state("http://auth.example"))).unwrap();
    let response = server.get("/app").await;

    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("http://auth.example/authorize?response_type=code"));
    assert!(body.contains("response_type=token"));
    assert!(body.contains("/appauth/password"));
    assert!(body.contains("/appauth/client_credentials"));
}

#[tokio::test]
async fn test_pages_without_code_have_nothing_to_do() {
    let server = TestServer::new(router(demo_state("http://auth.example"))).unwrap();
    for page in ["/appauth/code", "/appauth/refresh", "/appauth/info"] {
        let response = server.get(page).await;
        response.assert_status_ok();
        assert!(response.text().contains("Nothing to do"), "{page}");
    }
}

#[tokio::test]
async fn test_landing_forwards_code() {
    let server = TestServer::new(router(demo_state("http://auth.example"))).unwrap();

    let response = server.get("/appauth").add_query_param("code", "abc").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("/appauth/code?code=abc")
    );

    // implicit results live in the fragment, so the page forwards them itself
    let response = server.get("/appauth").await;
    response.assert_status_ok();
    assert!(response.text().contains("/appauth/token?"));
}

#[tokio::test]
async fn test_code_page_waits_for_doparse() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&mock)
        .await;
    let server = demo_server(&mock).await;

    let response = server.get("/appauth/code").add_query_param("code", "abc").await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("Received code abc"));
    assert!(body.contains("doparse=1"));
}

#[tokio::test]
async fn test_code_exchange_page() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", DEMO_BASIC))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "R1",
            "scope": "everything"
        })))
        .expect(1)
        .mount(&mock)
        .await;
    let server = demo_server(&mock).await;

    let response = server
        .get("/appauth/code")
        .add_query_param("code", "abc")
        .add_query_param("doparse", "1")
        .await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("The server answered 200 OK"));
    assert!(body.contains("T1"));
    assert!(body.contains("/appauth/info?code=T1"));
    assert!(body.contains("/appauth/refresh?code=R1"));
}

#[tokio::test]
async fn test_password_page_shows_server_error() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=test"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid resource owner credentials"
        })))
        .mount(&mock)
        .await;
    let server = demo_server(&mock).await;

    let response = server.get("/appauth/password").await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("400 Bad Request"));
    assert!(body.contains("invalid_grant"));
}

#[tokio::test]
async fn test_client_credentials_page() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", DEMO_BASIC))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T9",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "everything"
        })))
        .expect(1)
        .mount(&mock)
        .await;
    let server = demo_server(&mock).await;

    let body = server.get("/appauth/client_credentials").await.text();
    assert!(body.contains("/appauth/info?code=T9"));
    assert!(!body.contains("/appauth/refresh?code="));
}

#[tokio::test]
async fn test_refresh_page() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T2",
            "refresh_token": "R2"
        })))
        .expect(1)
        .mount(&mock)
        .await;
    let server = demo_server(&mock).await;

    let body = server
        .get("/appauth/refresh")
        .add_query_param("code", "R1")
        .await
        .text();
    assert!(body.contains("/appauth/refresh?code=R2"));
}

#[tokio::test]
async fn test_info_page() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .and(query_param("code", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": "1234",
            "access_token": "T1",
            "user": null
        })))
        .expect(1)
        .mount(&mock)
        .await;
    let server = demo_server(&mock).await;

    let response = server.get("/appauth/info").add_query_param("code", "T1").await;
    response.assert_status_ok();
    assert!(response.text().contains("1234"));
}

#[tokio::test]
async fn test_implicit_token_page() {
    let server = TestServer::new(router(demo_state("http://auth.example"))).unwrap();

    let body = server
        .get("/appauth/token")
        .add_query_param("access_token", "T5")
        .add_query_param("expires_in", "3600")
        .add_query_param("state", "xyz")
        .await
        .text();
    assert!(body.contains("T5"));
    assert!(body.contains("/appauth/info?code=T5"));

    let body = server
        .get("/appauth/token")
        .add_query_param("error", "access_denied")
        .await
        .text();
    assert!(body.contains("access_denied"));
}

#[tokio::test]
async fn test_unreachable_server_is_reported() {
    // nothing listens on the discard port
    let server = TestServer::new(router(demo_state("http://127.0.0.1:9"))).unwrap();

    let response = server.get("/appauth/client_credentials").await;
    response.assert_status_ok();
    assert!(response.text().contains("Network error"));
}

#[tokio::test]
async fn test_seed_demo_is_idempotent() {
    let storage = DbStorage::new(test_db().await);
    let state = demo_state("http://localhost:8080");

    seed_demo(&storage, &state).await.unwrap();
    seed_demo(&storage, &state).await.unwrap();

    let client = storage.get_client("1234").await.unwrap();
    assert_eq!(client.secret.as_deref(), Some("aabbccdd"));
    assert_eq!(client.redirect_uri, "http://localhost:8080/appauth");
    assert!(storage.verify("test", "test").await.unwrap().is_some());
}
