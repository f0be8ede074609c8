//! Bearer-token authentication for protected routes.
//!
//! [`require_bearer`] resolves the presented access token through the store
//! and attaches an [`Authenticated`] value to the request; handlers behind it
//! read that value with the [`BearerAuth`] extractor.

use crate::error::{ErrorCode, StoreError};
use crate::model::{AccessToken, Identity};
use crate::oauth2::OAuth2Server;
use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The resolved token and the identity it speaks for.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: AccessToken,
    pub identity: Identity,
}

/// Error type for authentication failures
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthError {
    /// Error code (e.g., "invalid_token")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthError {
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self {
            error: ErrorCode::InvalidToken.as_str().to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            error: ErrorCode::ServerError.as_str().to_string(),
            error_description: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = if self.error == ErrorCode::InvalidToken.as_str() {
            ErrorCode::InvalidToken.status()
        } else {
            ErrorCode::ServerError.status()
        };
        let mut response = (status, Json(self)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}

/// Pull the bearer credential out of a request.
///
/// The `Authorization` header wins. Without one, the `access_token` query
/// parameter is used, for clients that cannot set headers. A header using any
/// other scheme is an error even if the query parameter is present.
pub fn extract_bearer(headers: &HeaderMap, query: Option<&str>) -> Result<Option<String>, AuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AuthError::invalid_token("Malformed Authorization header"))?;
        return match value.split_once(' ') {
            Some((scheme, token))
                if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
            {
                Ok(Some(token.trim().to_string()))
            }
            _ => Err(AuthError::invalid_token(
                "Authorization header must use Bearer scheme",
            )),
        };
    }
    Ok(query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, value)| key == "access_token" && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    }))
}

/// Middleware rejecting requests without a live access token.
pub async fn require_bearer(
    State(server): State<OAuth2Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer(request.headers(), request.uri().query())?
        .ok_or_else(|| AuthError::invalid_token("Missing access token"))?;

    let record = match server.store.load_access_token(&token).await {
        Ok(record) => record,
        Err(StoreError::Expired) => {
            tracing::debug!("Rejected expired access token");
            return Err(AuthError::invalid_token("Access token has expired"));
        }
        Err(e) if e.is_invalid_credential() => {
            tracing::debug!("Rejected unknown access token");
            return Err(AuthError::invalid_token("Invalid access token"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Database error validating access token");
            return Err(AuthError::server_error());
        }
    };

    let identity = record.identity.clone();
    request.extensions_mut().insert(Authenticated {
        token: record,
        identity,
    });
    Ok(next.run(request).await)
}

/// Axum extractor for handlers behind [`require_bearer`].
///
/// # Example
///
/// ```ignore
/// async fn handler(BearerAuth(auth): BearerAuth) -> impl IntoResponse {
///     format!("Hello, {:?}", auth.identity)
/// }
/// ```
pub struct BearerAuth(pub Authenticated);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .map(BearerAuth)
            .ok_or_else(|| {
                tracing::error!("BearerAuth used on a route without require_bearer");
                AuthError::server_error()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn header_takes_precedence() {
        let token = extract_bearer(&headers("Bearer T1"), Some("access_token=T2")).unwrap();
        assert_eq!(token.as_deref(), Some("T1"));
    }

    #[test]
    fn query_parameter_fallback() {
        let token = extract_bearer(&HeaderMap::new(), Some("foo=1&access_token=T%2B2")).unwrap();
        assert_eq!(token.as_deref(), Some("T+2"));
        assert_eq!(extract_bearer(&HeaderMap::new(), None).unwrap(), None);
        assert_eq!(
            extract_bearer(&HeaderMap::new(), Some("access_token=")).unwrap(),
            None
        );
    }

    #[test]
    fn non_bearer_header_is_rejected_even_with_query() {
        let err = extract_bearer(&headers("Basic abc"), Some("access_token=T2")).unwrap_err();
        assert_eq!(err.error, "invalid_token");
        assert!(extract_bearer(&headers("Bearer "), None).is_err());
    }
}
