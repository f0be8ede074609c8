//! HTTP surface of the authorization server.
//!
//! - `oauth2` endpoints (`/authorize`, `/token`, `/info`, `/revoke`)
//! - `me` - Example protected resource (`/me`)
//! - `health` - Health check endpoint (`/healthz`)
//! - `openapi` - OpenAPI/Utoipa configuration, served at `/api-docs`
//! - `timeout` - Per-request deadline applied to every route
//! - the demo client pages when enabled

pub mod auth;
pub mod health;
pub mod me;
pub mod openapi;
pub mod timeout;

pub use health::MISC_TAG;

use crate::oauth2::{self, OAuth2Server, appauth::DemoState};
use axum::{Router, middleware};
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Assemble every route the server exposes.
pub fn build_router(server: OAuth2Server, demo: Option<DemoState>) -> Router {
    let limit = Duration::from_secs(server.config.request_timeout);
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(oauth2::router(server.clone()))
        .merge(me::router(server))
        .routes(routes!(health::health))
        .split_for_parts();

    let mut router = router.merge(Redoc::with_url("/api-docs", api));
    if let Some(demo) = demo {
        router = router.merge(oauth2::appauth::router(demo));
    }

    router
        .layer(middleware::from_fn_with_state(limit, timeout::request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the router until the process is stopped.
#[tracing::instrument(skip(router))]
pub async fn start_webserver(router: Router, listen_addr: &str) -> color_eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
