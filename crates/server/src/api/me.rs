//! Protected endpoint describing the caller.

use crate::api::auth::{AuthError, BearerAuth, require_bearer};
use crate::api::health::MISC_TAG;
use crate::oauth2::OAuth2Server;
use axum::{Json, middleware};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub client_id: String,
    /// `null` when the token represents the client itself
    pub user: Option<String>,
    pub scope: String,
}

pub fn router(server: OAuth2Server) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(me))
        .layer(middleware::from_fn_with_state(server, require_bearer))
}

#[tracing::instrument(skip(auth))]
#[utoipa::path(
    get,
    path = "/me",
    tag = MISC_TAG,
    operation_id = "Current Identity",
    summary = "Identity behind the access token",
    security(("Bearer" = [])),
    params(
        ("access_token" = Option<String>, Query, description = "Alternative to the Authorization header"),
    ),
    responses(
        (status = 200, description = "Resolved identity", body = MeResponse),
        (status = 401, description = "Missing, unknown or expired token", body = AuthError),
    )
)]
pub async fn me(BearerAuth(auth): BearerAuth) -> Json<MeResponse> {
    Json(MeResponse {
        client_id: auth.token.client_id.clone(),
        user: auth.identity.user_id().map(String::from),
        scope: auth.token.scope,
    })
}
