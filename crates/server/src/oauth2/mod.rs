//! OAuth2 authorization server.
//!
//! ## Supported flows
//!
//! - Authorization Code (`response_type=code`, `grant_type=authorization_code`)
//! - Implicit (`response_type=token`)
//! - Refresh Token, with rotation
//! - Resource Owner Password Credentials
//! - Client Credentials
//!
//! ## Endpoints
//!
//! - `GET|POST /authorize` - Authorization endpoint, shows the login form
//! - `GET|POST /token` - Token endpoint
//! - `GET /info` - Token introspection
//! - `POST /revoke` - Token revocation
//! - `GET /app`, `GET /appauth/*` - Demo client pages (optional)

pub mod appauth;
pub mod endpoints;
pub mod grant;
pub mod handlers;
pub mod login;
pub mod password;
pub mod request;
mod state;

pub use endpoints::router;
pub use login::{LoginOutcome, PasswordLogin, ResourceOwnerLogin};
pub use password::{generate_token, hash_password, verify_password};
pub use request::{OAuthRequest, OAuthResponse};
pub use state::OAuth2Server;

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
