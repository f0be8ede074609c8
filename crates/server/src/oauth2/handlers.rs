//! Protocol state machines for the authorize, token, info and revoke
//! endpoints.
//!
//! Each handler consumes an [`OAuthRequest`] and always terminates in exactly
//! one [`OAuthResponse`]. Decisions come from [`grant`]; all persistence goes
//! through the server's store.

use crate::config::GrantType;
use crate::error::{Denial, ErrorCode, StoreError};
use crate::model::{AccessToken, Client};
use crate::oauth2::grant::{
    self, Approval, AuthorizeParams, AuthorizeRejection, Decision, Grant, Issue, Minted,
};
use crate::oauth2::login::LoginOutcome;
use crate::oauth2::password::generate_token;
use crate::oauth2::request::{AuthorizationHeader, OAuthRequest, OAuthResponse};
use crate::oauth2::state::OAuth2Server;
use axum::http::{Method, StatusCode};
use serde::Serialize;
use time::OffsetDateTime;
use url::Url;
use utoipa::ToSchema;

/// Log the full detail and hand out the opaque variant.
fn storage_failure(err: StoreError) -> Denial {
    tracing::error!(error = %err, "Storage failure while handling OAuth2 request");
    Denial::server_error()
}

fn random_token() -> Result<String, Denial> {
    generate_token().map_err(|e| storage_failure(StoreError::Random(e)))
}

/// Redirect back to the (already verified) client URI with an error.
fn error_redirect(redirect_uri: &str, state: Option<&str>, denial: &Denial) -> OAuthResponse {
    tracing::warn!(error = %denial.code, description = %denial.description, "Authorization request denied");
    match Url::parse(redirect_uri) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("error", denial.code.as_str());
                pairs.append_pair("error_description", &denial.description);
                if let Some(state) = state {
                    pairs.append_pair("state", state);
                }
            }
            OAuthResponse::redirect(url.into())
        }
        Err(e) => {
            tracing::error!(error = %e, redirect_uri, "Registered redirect URI is not a valid URL");
            OAuthResponse::error(denial)
        }
    }
}

fn unparsable_redirect(redirect_uri: &str, err: url::ParseError) -> Denial {
    tracing::error!(error = %err, redirect_uri, "Registered redirect URI is not a valid URL");
    Denial::server_error()
}

/// Identify and authenticate the calling client.
///
/// HTTP Basic credentials win; request parameters are the fallback.
async fn authenticate_client(server: &OAuth2Server, req: &OAuthRequest) -> Result<Client, Denial> {
    let (client_id, secret) = match req.authorization() {
        AuthorizationHeader::Basic { user, password } => {
            (user, Some(password).filter(|p| !p.is_empty()))
        }
        AuthorizationHeader::Absent => {
            let client_id = req
                .param("client_id")
                .ok_or_else(|| Denial::invalid_request("Missing client_id"))?;
            let secret = req.param("client_secret");
            if secret.is_some() && !server.config.allow_client_secret_in_params {
                return Err(Denial::invalid_request(
                    "client_secret must be sent with HTTP Basic authentication",
                ));
            }
            (client_id.to_string(), secret.map(String::from))
        }
        AuthorizationHeader::Bearer(_) | AuthorizationHeader::Malformed => {
            return Err(Denial::invalid_client("Unsupported Authorization header"));
        }
    };
    let client = match server.store.get_client(&client_id).await {
        Ok(client) => client,
        Err(StoreError::NotFound) => {
            tracing::warn!(client_id = %client_id, "Unknown client");
            return Err(Denial::invalid_client("Client authentication failed"));
        }
        Err(e) => return Err(storage_failure(e)),
    };
    grant::authenticate_client(&client, secret.as_deref()).inspect_err(|_| {
        tracing::warn!(client_id = %client.id, "Client secret mismatch");
    })?;
    Ok(client)
}

fn mint(issue: Issue) -> Result<AccessToken, Denial> {
    let refresh_token = if issue.wants_refresh_token() {
        Some(random_token()?)
    } else {
        None
    };
    Ok(issue.into_token(Minted {
        id: uuid::Uuid::new_v4().to_string(),
        access_token: random_token()?,
        refresh_token,
    }))
}

// ---------------------------------------------------------------------------
// Authorize
// ---------------------------------------------------------------------------

#[tracing::instrument(skip_all, fields(client_id = req.param("client_id"), method = %req.method))]
pub async fn authorize(server: &OAuth2Server, req: &OAuthRequest) -> OAuthResponse {
    match authorize_request(server, req).await {
        Ok(response) => response,
        Err(denial) => {
            tracing::warn!(error = %denial.code, description = %denial.description, "Authorization request rejected");
            let mut response = OAuthResponse::error(&denial);
            // no client authentication happens here, an unknown client is a bad request
            if denial.code == ErrorCode::InvalidClient {
                response.status = StatusCode::BAD_REQUEST;
            }
            response
        }
    }
}

async fn authorize_request(
    server: &OAuth2Server,
    req: &OAuthRequest,
) -> Result<OAuthResponse, Denial> {
    let params = AuthorizeParams {
        response_type: req.param("response_type").map(String::from),
        client_id: req.param("client_id").map(String::from),
        redirect_uri: req.param("redirect_uri").map(String::from),
        scope: req.param("scope").map(String::from),
        state: req.param("state").map(String::from),
    };
    let client = match params.client_id.as_deref() {
        Some(id) => match server.store.get_client(id).await {
            Ok(client) => Some(client),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(storage_failure(e)),
        },
        None => None,
    };

    let target = match grant::validate_authorization(&server.policy, client.as_ref(), &params) {
        Ok(target) => target,
        Err(AuthorizeRejection::Direct(denial)) => return Err(denial),
        Err(AuthorizeRejection::Redirect {
            redirect_uri,
            state,
            denial,
        }) => return Ok(error_redirect(&redirect_uri, state.as_deref(), &denial)),
    };

    let user_id = match server
        .login
        .authenticate(req, &target)
        .await
        .map_err(storage_failure)?
    {
        LoginOutcome::Authenticated(user_id) => user_id,
        LoginOutcome::Responded(response) => return Ok(response),
        LoginOutcome::Denied => {
            let denial = Denial::new(
                ErrorCode::AccessDenied,
                "The resource owner denied the request",
            );
            return Ok(error_redirect(
                &target.redirect_uri,
                target.state.as_deref(),
                &denial,
            ));
        }
    };

    match grant::approve(&server.policy, target, user_id, OffsetDateTime::now_utc()) {
        Approval::Code(issue) => {
            let mut url = Url::parse(&issue.redirect_uri)
                .map_err(|e| unparsable_redirect(&issue.redirect_uri, e))?;
            let state = issue.state.clone();
            let code = issue.into_code(random_token()?);
            let code_value = code.code.clone();
            server
                .store
                .save_authorization_code(code)
                .await
                .map_err(storage_failure)?;
            tracing::info!("Issued authorization code");
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("code", &code_value);
                if let Some(state) = &state {
                    pairs.append_pair("state", state);
                }
            }
            Ok(OAuthResponse::redirect(url.into()).no_store())
        }
        Approval::Token(issue) => {
            let mut url = Url::parse(&issue.redirect_uri)
                .map_err(|e| unparsable_redirect(&issue.redirect_uri, e))?;
            let token = mint(issue)?;
            server
                .store
                .save_access_token(token.clone())
                .await
                .map_err(storage_failure)?;
            tracing::info!("Issued access token via implicit grant");
            let mut fragment = url::form_urlencoded::Serializer::new(String::new());
            fragment
                .append_pair("access_token", &token.access_token)
                .append_pair("token_type", "Bearer")
                .append_pair("expires_in", &token.expires_in.to_string())
                .append_pair("scope", &token.scope);
            if let Some(state) = req.param("state") {
                fragment.append_pair("state", state);
            }
            url.set_fragment(Some(&fragment.finish()));
            Ok(OAuthResponse::redirect(url.into()).no_store())
        }
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Successful token endpoint response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

impl From<&AccessToken> for TokenResponse {
    fn from(token: &AccessToken) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.clone(),
            scope: token.scope.clone(),
        }
    }
}

fn json_ok(body: impl Serialize) -> OAuthResponse {
    match serde_json::to_value(body) {
        Ok(value) => OAuthResponse::json(StatusCode::OK, value),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            OAuthResponse::error(&Denial::server_error())
        }
    }
}

#[tracing::instrument(skip_all, fields(grant_type = req.param("grant_type"), method = %req.method))]
pub async fn token(server: &OAuth2Server, req: &OAuthRequest) -> OAuthResponse {
    let response = match token_request(server, req).await {
        Ok(response) => response,
        Err(denial) => {
            tracing::debug!(error = %denial.code, description = %denial.description, "Token request denied");
            OAuthResponse::error(&denial)
        }
    };
    response.no_store()
}

async fn token_request(server: &OAuth2Server, req: &OAuthRequest) -> Result<OAuthResponse, Denial> {
    if req.method == Method::GET && !server.config.allow_get_access_request {
        return Err(Denial::invalid_request("Token requests must use POST"));
    }
    let grant_type = grant::parse_grant_type(&server.policy, req.param("grant_type"))?;
    let client = authenticate_client(server, req).await?;
    let now = OffsetDateTime::now_utc();
    let scope = req.param("scope").unwrap_or_default();

    let decision = match grant_type {
        GrantType::AuthorizationCode => {
            let value = req
                .param("code")
                .ok_or_else(|| Denial::invalid_request("Missing code"))?;
            let code = match server.store.load_authorization_code(value).await {
                Ok(code) => code,
                Err(e) if e.is_invalid_credential() => {
                    return Err(Denial::invalid_grant("Invalid authorization code"));
                }
                Err(e) => return Err(storage_failure(e)),
            };
            let grant = Grant::AuthorizationCode {
                client: &client,
                code: &code,
                redirect_uri: req.param("redirect_uri"),
            };
            grant::evaluate(&server.policy, grant, now)
        }
        GrantType::RefreshToken => {
            let value = req
                .param("refresh_token")
                .ok_or_else(|| Denial::invalid_request("Missing refresh_token"))?;
            let record = match server.store.load_by_refresh_token(value).await {
                Ok(record) => record,
                Err(e) if e.is_invalid_credential() => {
                    return Err(Denial::invalid_grant("Invalid refresh token"));
                }
                Err(e) => return Err(storage_failure(e)),
            };
            let grant = Grant::RefreshToken {
                client: &client,
                record: &record,
            };
            grant::evaluate(&server.policy, grant, now)
        }
        GrantType::Password => {
            let (Some(username), Some(password)) = (req.param("username"), req.param("password"))
            else {
                return Err(Denial::invalid_request("Missing username or password"));
            };
            let user_id = server
                .verifier
                .verify(username, password)
                .await
                .map_err(storage_failure)?;
            let grant = Grant::Password {
                client: &client,
                user_id,
                scope,
            };
            grant::evaluate(&server.policy, grant, now)
        }
        GrantType::ClientCredentials => {
            let grant = Grant::ClientCredentials {
                client: &client,
                scope,
            };
            grant::evaluate(&server.policy, grant, now)
        }
    };

    let issue = match decision {
        Decision::Authorized(issue) => issue,
        Decision::Denied(denial) => return Err(denial),
    };
    let token = finish_access_request(server, issue).await?;
    tracing::info!(
        client_id = %token.client_id,
        grant_type = grant_type.as_str(),
        refresh = token.refresh_token.is_some(),
        "Issued access token"
    );
    Ok(json_ok(TokenResponse::from(&token)))
}

/// Persist the outcome of an authorized grant.
///
/// A code is consumed before anything else is written. If persisting the
/// token fails afterwards the code stays consumed and the client gets
/// `server_error`.
async fn finish_access_request(server: &OAuth2Server, issue: Issue) -> Result<AccessToken, Denial> {
    if let Some(code) = issue.consume_code.as_deref() {
        match server.store.consume_authorization_code(code).await {
            Ok(()) => {}
            Err(e) if e.is_invalid_credential() => {
                tracing::warn!("Authorization code replayed");
                return Err(Denial::invalid_grant(
                    "Authorization code has already been used",
                ));
            }
            Err(e) => return Err(storage_failure(e)),
        }
    }
    let rotate = issue.rotate_refresh.clone();
    let token = mint(issue)?;
    match rotate {
        Some(old) => match server.store.rotate_refresh_token(&old, token.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_invalid_credential() => {
                tracing::warn!("Refresh token replayed");
                return Err(Denial::invalid_grant("Refresh token has already been used"));
            }
            Err(e) => return Err(storage_failure(e)),
        },
        None => server
            .store
            .save_access_token(token.clone())
            .await
            .map_err(storage_failure)?,
    }
    Ok(token)
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

/// Metadata of a live access token. Every field is fixed at issuance.
#[derive(Debug, Serialize, ToSchema)]
pub struct InfoResponse {
    pub client_id: String,
    pub access_token: String,
    pub token_type: String,
    pub scope: String,
    pub redirect_uri: String,
    /// `null` for tokens representing the client itself
    pub user: Option<String>,
    /// Unix seconds
    pub created_at: i64,
    /// Lifetime in seconds, counted from `created_at`
    pub expires_in: i64,
}

impl From<&AccessToken> for InfoResponse {
    fn from(token: &AccessToken) -> Self {
        Self {
            client_id: token.client_id.clone(),
            access_token: token.access_token.clone(),
            token_type: "Bearer".to_string(),
            scope: token.scope.clone(),
            redirect_uri: token.redirect_uri.clone(),
            user: token.identity.user_id().map(String::from),
            created_at: token.created_at.unix_timestamp(),
            expires_in: token.expires_in,
        }
    }
}

#[tracing::instrument(skip_all)]
pub async fn info(server: &OAuth2Server, req: &OAuthRequest) -> OAuthResponse {
    let response = match info_request(server, req).await {
        Ok(response) => response,
        Err(denial) => {
            tracing::debug!(error = %denial.code, "Token introspection denied");
            OAuthResponse::error(&denial)
        }
    };
    response.no_store()
}

async fn info_request(server: &OAuth2Server, req: &OAuthRequest) -> Result<OAuthResponse, Denial> {
    let presented = match req.authorization() {
        AuthorizationHeader::Bearer(token) => Some(token),
        _ => req.param("code"),
    };
    let presented = presented.ok_or_else(|| Denial::invalid_request("Missing access token"))?;
    let token = match server.store.load_access_token(presented).await {
        Ok(token) => token,
        Err(StoreError::Expired) => return Err(Denial::invalid_grant("Access token has expired")),
        Err(e) if e.is_invalid_credential() => {
            return Err(Denial::invalid_request("Unknown access token"));
        }
        Err(e) => return Err(storage_failure(e)),
    };
    Ok(json_ok(InfoResponse::from(&token)))
}

// ---------------------------------------------------------------------------
// Revoke
// ---------------------------------------------------------------------------

#[tracing::instrument(skip_all)]
pub async fn revoke(server: &OAuth2Server, req: &OAuthRequest) -> OAuthResponse {
    let response = match revoke_request(server, req).await {
        Ok(response) => response,
        Err(denial) => OAuthResponse::error(&denial),
    };
    response.no_store()
}

async fn revoke_request(server: &OAuth2Server, req: &OAuthRequest) -> Result<OAuthResponse, Denial> {
    let client = authenticate_client(server, req).await?;
    let token = req
        .param("token")
        .ok_or_else(|| Denial::invalid_request("Missing token"))?;
    let revoked = if req.param("token_type_hint") == Some("refresh_token") {
        revoke_refresh(server, &client, token).await? || revoke_access(server, &client, token).await?
    } else {
        revoke_access(server, &client, token).await? || revoke_refresh(server, &client, token).await?
    };
    tracing::info!(client_id = %client.id, revoked, "Processed revocation request");
    Ok(OAuthResponse::empty(StatusCode::OK))
}

async fn revoke_access(server: &OAuth2Server, client: &Client, token: &str) -> Result<bool, Denial> {
    match server.store.load_access_token(token).await {
        Ok(record) if record.client_id == client.id => {
            server
                .store
                .revoke_access_token(token)
                .await
                .map_err(storage_failure)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.is_invalid_credential() => Ok(false),
        Err(e) => Err(storage_failure(e)),
    }
}

/// Revoking a refresh token also retires the access token minted with it.
async fn revoke_refresh(server: &OAuth2Server, client: &Client, token: &str) -> Result<bool, Denial> {
    match server.store.load_by_refresh_token(token).await {
        Ok(record) if record.client_id == client.id => {
            server
                .store
                .revoke_refresh_token(token)
                .await
                .map_err(storage_failure)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.is_invalid_credential() => Ok(false),
        Err(e) => Err(storage_failure(e)),
    }
}
