//! Demo pages under `/app` and `/appauth/*`.
//!
//! These act as a client of this very server: they start the code and
//! implicit flows through the browser and call `/token` and `/info` over
//! HTTP with the demo client's credentials, then show the raw JSON. They are
//! for manual testing only and hold no authority of their own.

use crate::config::{AppConfig, DemoConfig};
use crate::error::StoreError;
use crate::model::NewClient;
use crate::store::{DbStorage, Storage};
use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    http::{Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use url::Url;

const DEMO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("Timeout after {0:?} while calling the authorization server")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
}

/// Minimal HTTP/1 client for calling back into the server.
#[derive(Clone, Debug)]
pub struct DemoClient {
    timeout: Duration,
    client_id: String,
    client_secret: String,
}

impl DemoClient {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            timeout: DEMO_TIMEOUT,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn basic_auth(&self) -> String {
        let credentials = format!(
            "{}:{}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.client_secret)
        );
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    /// Send a request and decode the JSON answer, whatever its status.
    #[tracing::instrument(skip(self, url, form), fields(url = %url))]
    pub async fn call(
        &self,
        method: Method,
        url: &Url,
        form: Option<String>,
    ) -> Result<(StatusCode, serde_json::Value), DemoError> {
        tokio::time::timeout(self.timeout, self.send(method, url, form))
            .await
            .map_err(|_| DemoError::Timeout(self.timeout))?
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        form: Option<String>,
    ) -> Result<(StatusCode, serde_json::Value), DemoError> {
        if url.scheme() != "http" {
            return Err(DemoError::UnsupportedUrl(url.to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| DemoError::UnsupportedUrl(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| DemoError::Network(e.to_string()))?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| DemoError::Network(e.to_string()))?;
        tokio::task::spawn(async move {
            if let Err(err) = conn.await {
                tracing::error!("Connection failed: {err:#?}");
            }
        });

        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::HOST, host_header)
            .header(header::USER_AGENT, "oauth2-server-demo/0.1")
            .header(header::AUTHORIZATION, self.basic_auth());
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Full::new(Bytes::from(form))
            }
            None => Full::new(Bytes::new()),
        };
        let req = builder
            .body(body)
            .map_err(|e| DemoError::Network(e.to_string()))?;

        let res = sender
            .send_request(req)
            .await
            .map_err(|e| DemoError::Network(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| DemoError::Network(e.to_string()))?
            .to_bytes();
        let json =
            serde_json::from_slice(&bytes).map_err(|e| DemoError::InvalidJson(e.to_string()))?;
        Ok((status, json))
    }
}

#[derive(Clone)]
pub struct DemoState {
    pub config: Arc<DemoConfig>,
    pub api_url: Url,
    /// Where the authorization server sends the browser back to
    pub redirect_uri: Url,
    pub client: DemoClient,
}

impl DemoState {
    pub fn new(config: &AppConfig) -> Result<Self, url::ParseError> {
        let api_url = Url::parse(&config.api_url)?;
        Ok(Self {
            config: Arc::new(config.demo.clone()),
            redirect_uri: api_url.join("/appauth")?,
            api_url,
            client: DemoClient::new(&config.demo),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_url.join(path)
    }

    fn authorize_link(&self, response_type: &str) -> Result<String, url::ParseError> {
        let mut url = self.endpoint("/authorize")?;
        url.query_pairs_mut()
            .append_pair("response_type", response_type)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &self.config.scope)
            .append_pair("state", "xyz");
        Ok(url.into())
    }
}

/// Register the demo client and resource owner if they are missing.
pub async fn seed_demo(storage: &DbStorage, state: &DemoState) -> Result<(), StoreError> {
    let config = state.config.as_ref();
    match storage.get_client(&config.client_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => {
            storage
                .create_client(NewClient {
                    id: Some(config.client_id.clone()),
                    secret: Some(config.client_secret.clone()),
                    name: "Demo client".to_string(),
                    redirect_uri: state.redirect_uri.to_string(),
                    owner_id: "demo".to_string(),
                    public: false,
                })
                .await?;
        }
        Err(e) => return Err(e),
    }
    if storage.find_user_id(&config.username).await?.is_none() {
        storage
            .create_user(&config.username, &config.password)
            .await?;
    }
    Ok(())
}

pub fn router(state: DemoState) -> Router {
    Router::new()
        .route("/app", get(app_index))
        .route("/appauth", get(landing))
        .route("/appauth/code", get(code))
        .route("/appauth/token", get(implicit_token))
        .route("/appauth/password", get(password))
        .route("/appauth/client_credentials", get(client_credentials))
        .route("/appauth/refresh", get(refresh))
        .route("/appauth/info", get(info))
        .with_state(state)
}

#[derive(Debug, Clone)]
pub struct Link {
    pub label: String,
    pub href: String,
}

impl Link {
    fn new(label: &str, href: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            href: href.into(),
        }
    }
}

#[derive(Template)]
#[template(path = "app.html")]
struct AppTemplate<'a> {
    client_id: &'a str,
    scope: &'a str,
    links: Vec<Link>,
}

#[derive(Template, Default)]
#[template(path = "appauth.html")]
struct PageTemplate {
    title: String,
    message: Option<String>,
    error: Option<String>,
    result: Option<String>,
    forward_fragment: bool,
    links: Vec<Link>,
    home: &'static str,
}

impl PageTemplate {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            home: "/app",
            ..Default::default()
        }
    }

    fn nothing_to_do(title: &str) -> Self {
        Self {
            message: Some("Nothing to do".to_string()),
            ..Self::new(title)
        }
    }
}

fn render(template: impl Template) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render demo template: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

fn follow_up_links(json: &serde_json::Value) -> Vec<Link> {
    let mut links = Vec::new();
    if let Some(token) = json.get("access_token").and_then(|v| v.as_str()) {
        links.push(Link::new(
            "Show token info",
            format!("/appauth/info?code={}", urlencoding::encode(token)),
        ));
    }
    if let Some(token) = json.get("refresh_token").and_then(|v| v.as_str()) {
        links.push(Link::new(
            "Use the refresh token",
            format!("/appauth/refresh?code={}", urlencoding::encode(token)),
        ));
    }
    links
}

/// Call the server and turn the outcome into a result page.
async fn call_page(
    state: &DemoState,
    title: &str,
    method: Method,
    path: &str,
    params: &[(&str, &str)],
) -> Response {
    let mut page = PageTemplate::new(title);
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let outcome = match state.endpoint(path) {
        Ok(mut url) if method == Method::GET => {
            url.set_query(Some(&encoded));
            state.client.call(method, &url, None).await
        }
        Ok(url) => state.client.call(method, &url, Some(encoded)).await,
        Err(e) => Err(DemoError::UnsupportedUrl(e.to_string())),
    };
    match outcome {
        Ok((status, json)) => {
            page.message = Some(format!("The server answered {status}"));
            page.links = follow_up_links(&json);
            page.result = serde_json::to_string_pretty(&json).ok();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Demo request failed");
            page.error = Some(e.to_string());
        }
    }
    render(page)
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
    pub doparse: Option<String>,
}

async fn app_index(State(state): State<DemoState>) -> Response {
    let (code_link, token_link) = match (
        state.authorize_link("code"),
        state.authorize_link("token"),
    ) {
        (Ok(code), Ok(token)) => (code, token),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Cannot build demo links");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };
    render(AppTemplate {
        client_id: &state.config.client_id,
        scope: &state.config.scope,
        links: vec![
            Link::new("Authorization code flow", code_link),
            Link::new("Implicit flow", token_link),
            Link::new("Password grant", "/appauth/password"),
            Link::new("Client credentials grant", "/appauth/client_credentials"),
        ],
    })
}

/// Redirect target of the demo client.
///
/// A code goes on to the code page; an implicit token arrives in the URI
/// fragment, which only the browser sees, so the page forwards it.
async fn landing(Query(query): Query<CodeQuery>) -> Response {
    match query.code {
        Some(code) => axum::response::Redirect::to(&format!(
            "/appauth/code?code={}",
            urlencoding::encode(&code)
        ))
        .into_response(),
        None => render(PageTemplate {
            message: Some("Waiting for the authorization result".to_string()),
            forward_fragment: true,
            ..PageTemplate::new("Authorization result")
        }),
    }
}

async fn code(State(state): State<DemoState>, Query(query): Query<CodeQuery>) -> Response {
    let title = "Authorization code";
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return render(PageTemplate::nothing_to_do(title));
    };
    if query.doparse.as_deref() != Some("1") {
        return render(PageTemplate {
            message: Some(format!("Received code {code}")),
            links: vec![Link::new(
                "Exchange the code for a token",
                format!("/appauth/code?code={}&doparse=1", urlencoding::encode(&code)),
            )],
            ..PageTemplate::new(title)
        });
    }
    let redirect_uri = state.redirect_uri.to_string();
    call_page(
        &state,
        title,
        Method::POST,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", &redirect_uri),
        ],
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct ImplicitQuery {
    pub access_token: Option<String>,
    pub expires_in: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

async fn implicit_token(Query(query): Query<ImplicitQuery>) -> Response {
    let title = "Implicit grant";
    if let Some(error) = query.error {
        return render(PageTemplate {
            error: Some(error),
            ..PageTemplate::new(title)
        });
    }
    let Some(token) = query.access_token else {
        return render(PageTemplate::nothing_to_do(title));
    };
    let result = serde_json::json!({
        "access_token": token,
        "expires_in": query.expires_in,
        "scope": query.scope,
        "state": query.state,
    });
    render(PageTemplate {
        links: follow_up_links(&result),
        result: serde_json::to_string_pretty(&result).ok(),
        ..PageTemplate::new(title)
    })
}

async fn password(State(state): State<DemoState>) -> Response {
    let config = state.config.clone();
    call_page(
        &state,
        "Password grant",
        Method::POST,
        "/token",
        &[
            ("grant_type", "password"),
            ("username", &config.username),
            ("password", &config.password),
            ("scope", &config.scope),
        ],
    )
    .await
}

async fn client_credentials(State(state): State<DemoState>) -> Response {
    let config = state.config.clone();
    call_page(
        &state,
        "Client credentials grant",
        Method::POST,
        "/token",
        &[("grant_type", "client_credentials"), ("scope", &config.scope)],
    )
    .await
}

async fn refresh(State(state): State<DemoState>, Query(query): Query<CodeQuery>) -> Response {
    let title = "Refresh token";
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return render(PageTemplate::nothing_to_do(title));
    };
    call_page(
        &state,
        title,
        Method::POST,
        "/token",
        &[("grant_type", "refresh_token"), ("refresh_token", &code)],
    )
    .await
}

async fn info(State(state): State<DemoState>, Query(query): Query<CodeQuery>) -> Response {
    let title = "Token info";
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return render(PageTemplate::nothing_to_do(title));
    };
    call_page(&state, title, Method::GET, "/info", &[("code", &code)]).await
}
