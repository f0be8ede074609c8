//! Resource-owner login during the authorization step.
//!
//! The authorize handler asks a [`ResourceOwnerLogin`] for a verified user id.
//! The collaborator either produces one or answers the user agent itself, for
//! example with a login form; in the latter case the handler passes that
//! response through untouched.

use crate::error::StoreError;
use crate::oauth2::grant::AuthorizationTarget;
use crate::oauth2::request::{OAuthRequest, OAuthResponse};
use crate::store::CredentialVerifier;
use askama::Template;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use std::sync::Arc;

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(String),
    /// The resource owner refused the request
    Denied,
    /// The collaborator already produced the response for this request
    Responded(OAuthResponse),
}

#[async_trait]
pub trait ResourceOwnerLogin: Send + Sync {
    async fn authenticate(
        &self,
        request: &OAuthRequest,
        target: &AuthorizationTarget,
    ) -> Result<LoginOutcome, StoreError>;
}

/// Scope information for display on the login page.
#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub name: String,
    pub description: String,
}

fn get_scope_info(scope: &str) -> ScopeInfo {
    match scope {
        "everything" => ScopeInfo {
            name: "Everything".to_string(),
            description: "Full access to your account".to_string(),
        },
        _ => ScopeInfo {
            name: scope.to_string(),
            description: format!("Access to {scope}"),
        },
    }
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    action: &'a str,
    response_type: &'static str,
    client_id: &'a str,
    client_name: &'a str,
    redirect_uri: &'a str,
    scope: &'a str,
    state: Option<&'a str>,
    login: &'a str,
    error: Option<&'a str>,
    scopes: Vec<ScopeInfo>,
}

/// Username/password form posting back to the authorization endpoint.
#[derive(Clone)]
pub struct PasswordLogin {
    verifier: Arc<dyn CredentialVerifier>,
}

impl PasswordLogin {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    fn form(
        &self,
        request: &OAuthRequest,
        target: &AuthorizationTarget,
        status: StatusCode,
        error: Option<&str>,
    ) -> OAuthResponse {
        let template = LoginTemplate {
            action: &request.path,
            response_type: match target.response_type {
                crate::config::ResponseType::Code => "code",
                crate::config::ResponseType::Token => "token",
            },
            client_id: &target.client_id,
            client_name: &target.client_name,
            redirect_uri: &target.redirect_uri,
            scope: &target.scope,
            state: target.state.as_deref(),
            login: request.param("login").unwrap_or_default(),
            error,
            scopes: target.scope.split_whitespace().map(get_scope_info).collect(),
        };
        match template.render() {
            Ok(html) => OAuthResponse::html(status, html).no_store(),
            Err(e) => {
                tracing::error!("Failed to render login template: {}", e);
                OAuthResponse::error(&crate::error::Denial::server_error())
            }
        }
    }
}

#[async_trait]
impl ResourceOwnerLogin for PasswordLogin {
    #[tracing::instrument(skip_all, fields(client_id = %target.client_id))]
    async fn authenticate(
        &self,
        request: &OAuthRequest,
        target: &AuthorizationTarget,
    ) -> Result<LoginOutcome, StoreError> {
        if request.method != Method::POST {
            return Ok(LoginOutcome::Responded(self.form(
                request,
                target,
                StatusCode::OK,
                None,
            )));
        }
        if request.form.contains_key("deny") {
            return Ok(LoginOutcome::Denied);
        }
        let (Some(login), Some(password)) = (request.param("login"), request.param("password"))
        else {
            return Ok(LoginOutcome::Responded(self.form(
                request,
                target,
                StatusCode::OK,
                None,
            )));
        };
        match self.verifier.verify(login, password).await? {
            Some(user_id) => {
                tracing::info!(user_id = %user_id, "Resource owner authenticated");
                Ok(LoginOutcome::Authenticated(user_id))
            }
            None => {
                tracing::warn!("Resource owner login failed");
                Ok(LoginOutcome::Responded(self.form(
                    request,
                    target,
                    StatusCode::BAD_REQUEST,
                    Some("Invalid username or password"),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseType;
    use crate::oauth2::request::ResponseBody;

    struct Fixed;

    #[async_trait]
    impl CredentialVerifier for Fixed {
        async fn verify(&self, username: &str, password: &str) -> Result<Option<String>, StoreError> {
            Ok((username == "test" && password == "test").then(|| "42".to_string()))
        }
    }

    fn target() -> AuthorizationTarget {
        AuthorizationTarget {
            client_id: "1234".into(),
            client_name: "Demo <app>".into(),
            redirect_uri: "http://x/callback".into(),
            response_type: ResponseType::Code,
            scope: "everything".into(),
            state: Some("s1".into()),
        }
    }

    #[tokio::test]
    async fn get_renders_escaped_form() {
        let login = PasswordLogin::new(Arc::new(Fixed));
        let req = OAuthRequest::new(Method::GET, "/authorize");
        let outcome = login.authenticate(&req, &target()).await.unwrap();
        let LoginOutcome::Responded(response) = outcome else {
            panic!("expected a form");
        };
        assert_eq!(response.status, StatusCode::OK);
        let ResponseBody::Html(html) = response.body else {
            panic!("expected html");
        };
        assert!(html.contains("Demo &lt;app&gt;"));
        assert!(html.contains("name=\"state\" value=\"s1\""));
    }

    #[tokio::test]
    async fn post_with_valid_credentials_authenticates() {
        let login = PasswordLogin::new(Arc::new(Fixed));
        let req = OAuthRequest::new(Method::POST, "/authorize").with_form("login=test&password=test");
        let outcome = login.authenticate(&req, &target()).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(id) if id == "42"));
    }

    #[tokio::test]
    async fn post_with_bad_credentials_rerenders_with_400() {
        let login = PasswordLogin::new(Arc::new(Fixed));
        let req = OAuthRequest::new(Method::POST, "/authorize").with_form("login=test&password=nope");
        let outcome = login.authenticate(&req, &target()).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Responded(r) if r.status == StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn deny_button_denies() {
        let login = PasswordLogin::new(Arc::new(Fixed));
        let req = OAuthRequest::new(Method::POST, "/authorize").with_form("deny=1");
        let outcome = login.authenticate(&req, &target()).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Denied));
    }
}
