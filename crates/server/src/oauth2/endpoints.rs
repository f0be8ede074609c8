//! OAuth2 HTTP endpoints.
//!
//! Thin axum wrappers: each one hands the transport-independent request to
//! the matching handler in [`super::handlers`].

use crate::error::ErrorResponse;
use crate::oauth2::handlers::{self, InfoResponse, TokenResponse};
use crate::oauth2::request::{OAuthRequest, OAuthResponse};
use crate::oauth2::{OAUTH2_TAG, OAuth2Server};
use axum::extract::State;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router(server: OAuth2Server) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize_get, authorize_post))
        .routes(routes!(token_get, token_post))
        .routes(routes!(info))
        .routes(routes!(revoke))
        .with_state(server)
}

/// Form fields accepted by the token endpoint. Which ones are required
/// depends on `grant_type`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: String,
    /// `access_token` or `refresh_token`
    pub token_type_hint: Option<String>,
}

/// OAuth2 Authorization endpoint.
#[utoipa::path(
    get,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Start an authorization request",
    description = "Validates the client and its redirect URI, then asks the resource owner to sign in. \
                   On approval redirects to the client with `code` (response_type=code) or with an access \
                   token in the URI fragment (response_type=token).",
    params(
        ("response_type" = String, Query, description = "`code` or `token`"),
        ("client_id" = String, Query, description = "The client identifier."),
        ("redirect_uri" = Option<String>, Query, description = "Must equal the registered URI exactly."),
        ("scope" = Option<String>, Query, description = "Space-separated list of requested scopes."),
        ("state" = Option<String>, Query, description = "Opaque value echoed back to the client."),
    ),
    responses(
        (status = 200, description = "Login form (HTML)"),
        (status = 302, description = "Redirect to the client with a code, token or error"),
        (status = 400, description = "Unknown client, unknown redirect URI or malformed request", body = ErrorResponse),
    )
)]
async fn authorize_get(State(server): State<OAuth2Server>, request: OAuthRequest) -> OAuthResponse {
    handlers::authorize(&server, &request).await
}

/// Login form submission for the authorization endpoint.
#[utoipa::path(
    post,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize Submit",
    summary = "Submit resource-owner credentials",
    description = "Receives the login form together with the original authorization parameters.",
    responses(
        (status = 302, description = "Redirect to the client with a code, token or error"),
        (status = 400, description = "Invalid credentials, the form is shown again"),
    )
)]
async fn authorize_post(State(server): State<OAuth2Server>, request: OAuthRequest) -> OAuthResponse {
    handlers::authorize(&server, &request).await
}

/// Token endpoint, query-string variant.
#[utoipa::path(
    get,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token (GET)",
    summary = "Exchange a grant for an access token",
    description = "Same as the POST variant with parameters in the query string. \
                   Only available when `oauth2.allow_get_access_request` is set.",
    params(
        ("grant_type" = String, Query, description = "authorization_code, refresh_token, password or client_credentials"),
        ("code" = Option<String>, Query, description = "Authorization code (authorization_code)"),
        ("redirect_uri" = Option<String>, Query, description = "Redirect URI used at authorization (authorization_code)"),
        ("refresh_token" = Option<String>, Query, description = "Refresh token (refresh_token)"),
        ("username" = Option<String>, Query, description = "Resource owner name (password)"),
        ("password" = Option<String>, Query, description = "Resource owner password (password)"),
        ("scope" = Option<String>, Query, description = "Requested scope"),
        ("client_id" = Option<String>, Query, description = "Client id when not using HTTP Basic"),
        ("client_secret" = Option<String>, Query, description = "Client secret when not using HTTP Basic"),
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Grant denied", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
async fn token_get(State(server): State<OAuth2Server>, request: OAuthRequest) -> OAuthResponse {
    handlers::token(&server, &request).await
}

/// OAuth2 Token endpoint.
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange a grant for an access token",
    description = "Client credentials are read from HTTP Basic authentication first, then from the \
                   `client_id`/`client_secret` form fields.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Grant parameters"
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Grant denied", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
async fn token_post(State(server): State<OAuth2Server>, request: OAuthRequest) -> OAuthResponse {
    handlers::token(&server, &request).await
}

/// Token introspection.
#[utoipa::path(
    get,
    path = "/info",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token Info",
    summary = "Describe an access token",
    description = "The token is taken from `Authorization: Bearer` or the `code` query parameter.",
    params(
        ("code" = Option<String>, Query, description = "Access token to describe"),
    ),
    responses(
        (status = 200, description = "Token metadata", body = InfoResponse),
        (status = 400, description = "Missing, unknown or expired token", body = ErrorResponse),
    )
)]
async fn info(State(server): State<OAuth2Server>, request: OAuthRequest) -> OAuthResponse {
    handlers::info(&server, &request).await
}

/// Token revocation.
#[utoipa::path(
    post,
    path = "/revoke",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Revoke",
    summary = "Revoke an access or refresh token",
    description = "Requires client authentication. Answers 200 whether or not the token existed.",
    request_body(
        content = RevokeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token to revoke"
    ),
    responses(
        (status = 200, description = "Token revoked or unknown"),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
async fn revoke(State(server): State<OAuth2Server>, request: OAuthRequest) -> OAuthResponse {
    handlers::revoke(&server, &request).await
}
