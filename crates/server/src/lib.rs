//! An OAuth2 authorization server.
//!
//! Registered clients obtain authorization codes and access tokens through
//! the authorization code, implicit, resource owner password, client
//! credentials and refresh token flows. Tokens are opaque random strings
//! persisted through SeaORM; protected routes validate them with
//! [`api::auth::require_bearer`].

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod model;
pub mod oauth2;
pub mod store;
