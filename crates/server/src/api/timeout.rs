//! Per-request deadline.

use crate::error::Denial;
use crate::oauth2::request::OAuthResponse;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// Abandon a request that runs past `limit` and answer with `server_error`.
pub async fn request_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(%path, limit_ms = limit.as_millis() as u64, "Request timed out");
            OAuthResponse::error(&Denial::server_error()).into_response()
        }
    }
}
