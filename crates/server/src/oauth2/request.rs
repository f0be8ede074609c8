//! Transport-independent request and response model for the protocol
//! handlers, with the axum adapters on either side.

use crate::error::{Denial, ErrorResponse};
use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use base64::Engine;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct OAuthRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub headers: HeaderMap,
}

/// Contents of an `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthorizationHeader<'a> {
    Absent,
    Bearer(&'a str),
    Basic { user: String, password: String },
    Malformed,
}

fn parse_pairs(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

impl OAuthRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, raw: &str) -> Self {
        self.query = parse_pairs(raw.as_bytes());
        self
    }

    pub fn with_form(mut self, raw: &str) -> Self {
        self.form = parse_pairs(raw.as_bytes());
        self
    }

    /// A non-empty parameter, looked up in the form body first, then in the
    /// query string.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .get(name)
            .or_else(|| self.query.get(name))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn authorization(&self) -> AuthorizationHeader<'_> {
        let Some(value) = self.headers.get(header::AUTHORIZATION) else {
            return AuthorizationHeader::Absent;
        };
        let Ok(value) = value.to_str() else {
            return AuthorizationHeader::Malformed;
        };
        let Some((scheme, credentials)) = value.split_once(' ') else {
            return AuthorizationHeader::Malformed;
        };
        let credentials = credentials.trim();
        if credentials.is_empty() {
            return AuthorizationHeader::Malformed;
        }
        if scheme.eq_ignore_ascii_case("bearer") {
            AuthorizationHeader::Bearer(credentials)
        } else if scheme.eq_ignore_ascii_case("basic") {
            decode_basic(credentials).unwrap_or(AuthorizationHeader::Malformed)
        } else {
            AuthorizationHeader::Malformed
        }
    }
}

/// Basic credentials are form-urlencoded before base64 encoding.
fn decode_basic(credentials: &str) -> Option<AuthorizationHeader<'static>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(credentials)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some(AuthorizationHeader::Basic {
        user: urlencoding::decode(user).ok()?.into_owned(),
        password: urlencoding::decode(password).ok()?.into_owned(),
    })
}

impl<S> FromRequest<S> for OAuthRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req
            .uri()
            .query()
            .map(|q| parse_pairs(q.as_bytes()))
            .unwrap_or_default();
        let headers = req.headers().clone();
        let is_form = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let form = if is_form {
            parse_pairs(&body)
        } else {
            HashMap::new()
        };
        Ok(Self {
            method,
            path,
            query,
            form,
            headers,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Html(String),
    /// 302 to the given absolute URI
    Redirect(String),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OAuthResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
    /// Mark the response as uncacheable; set on everything carrying credentials
    pub no_store: bool,
}

impl OAuthResponse {
    pub fn json(status: StatusCode, value: serde_json::Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(value),
            no_store: false,
        }
    }

    pub fn html(status: StatusCode, html: String) -> Self {
        Self {
            status,
            body: ResponseBody::Html(html),
            no_store: false,
        }
    }

    pub fn redirect(location: String) -> Self {
        Self {
            status: StatusCode::FOUND,
            body: ResponseBody::Redirect(location),
            no_store: false,
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: ResponseBody::Empty,
            no_store: false,
        }
    }

    pub fn error(denial: &Denial) -> Self {
        let body = serde_json::to_value(ErrorResponse::from(denial)).unwrap_or_default();
        Self::json(denial.code.status(), body)
    }

    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }
}

impl IntoResponse for OAuthResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            ResponseBody::Json(value) => (self.status, Json(value)).into_response(),
            ResponseBody::Html(html) => (self.status, Html(html)).into_response(),
            ResponseBody::Redirect(location) => {
                let mut response = self.status.into_response();
                match HeaderValue::from_str(&location) {
                    Ok(value) => {
                        response.headers_mut().insert(header::LOCATION, value);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Redirect target is not a valid header value");
                        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    }
                }
                response
            }
            ResponseBody::Empty => self.status.into_response(),
        };
        if self.no_store {
            let headers = response.headers_mut();
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_auth(value: &str) -> OAuthRequest {
        let mut req = OAuthRequest::new(Method::POST, "/token");
        req.headers
            .insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        req
    }

    #[test]
    fn form_takes_precedence_and_empty_is_absent() {
        let req = OAuthRequest::new(Method::POST, "/authorize")
            .with_query("state=from-query&scope=")
            .with_form("state=from-form");
        assert_eq!(req.param("state"), Some("from-form"));
        assert_eq!(req.param("scope"), None);
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn parses_basic_credentials() {
        // "1234:aabbccdd"
        let req = with_auth("Basic MTIzNDphYWJiY2NkZA==");
        assert_eq!(
            req.authorization(),
            AuthorizationHeader::Basic {
                user: "1234".into(),
                password: "aabbccdd".into()
            }
        );
    }

    #[test]
    fn parses_bearer_and_rejects_garbage() {
        assert_eq!(with_auth("Bearer T1").authorization(), AuthorizationHeader::Bearer("T1"));
        assert_eq!(with_auth("bearer T1").authorization(), AuthorizationHeader::Bearer("T1"));
        assert_eq!(with_auth("Bearer").authorization(), AuthorizationHeader::Malformed);
        assert_eq!(with_auth("Token T1").authorization(), AuthorizationHeader::Malformed);
        assert_eq!(with_auth("Basic !!!").authorization(), AuthorizationHeader::Malformed);
        assert_eq!(
            OAuthRequest::new(Method::GET, "/").authorization(),
            AuthorizationHeader::Absent
        );
    }

    #[test]
    fn no_store_sets_cache_headers() {
        let response = OAuthResponse::json(StatusCode::OK, serde_json::json!({}))
            .no_store()
            .into_response();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    }

    #[test]
    fn redirect_sets_location() {
        let response = OAuthResponse::redirect("http://x/callback?code=abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "http://x/callback?code=abc");
    }
}
