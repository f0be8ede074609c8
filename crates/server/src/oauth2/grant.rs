//! Authorization decisions.
//!
//! Everything in here is a pure function of the presented parameters, the
//! records the handler looked up and the current time. Nothing is persisted
//! and nothing is generated; the handlers turn an [`Issue`] into stored state.

use crate::config::{GrantType, OAuth2Config, ResponseType};
use crate::error::{Denial, ErrorCode};
use crate::model::{AccessToken, AuthorizationCode, Client, Identity};
use time::OffsetDateTime;

/// What a grant is allowed to produce, derived from [`OAuth2Config`].
#[derive(Clone, Debug)]
pub struct Policy {
    pub code_lifetime: i64,
    pub access_lifetime: i64,
    pub refresh_lifetime: Option<i64>,
    pub grant_types: Vec<GrantType>,
    pub response_types: Vec<ResponseType>,
}

impl From<&OAuth2Config> for Policy {
    fn from(config: &OAuth2Config) -> Self {
        Self {
            code_lifetime: config.authorization_code_lifetime,
            access_lifetime: config.access_token_lifetime,
            refresh_lifetime: config
                .issue_refresh_tokens
                .then_some(config.refresh_token_lifetime),
            grant_types: config.allowed_grant_types.clone(),
            response_types: config.allowed_response_types.clone(),
        }
    }
}

/// A token-endpoint request after client authentication and record lookup.
#[derive(Debug)]
pub enum Grant<'a> {
    AuthorizationCode {
        client: &'a Client,
        code: &'a AuthorizationCode,
        /// As presented; defaults to the client's registered URI
        redirect_uri: Option<&'a str>,
    },
    RefreshToken {
        client: &'a Client,
        record: &'a AccessToken,
    },
    Password {
        client: &'a Client,
        /// Result of the identity-store check, `None` on mismatch
        user_id: Option<String>,
        scope: &'a str,
    },
    ClientCredentials {
        client: &'a Client,
        scope: &'a str,
    },
}

/// Parameters of an access token to mint.
#[derive(Clone, Debug, PartialEq)]
pub struct Issue {
    pub client_id: String,
    pub identity: Identity,
    pub scope: String,
    pub redirect_uri: String,
    pub issued_at: OffsetDateTime,
    pub access_lifetime: i64,
    /// `Some` when a refresh token must be minted alongside
    pub refresh_lifetime: Option<i64>,
    /// Code to consume before anything is persisted
    pub consume_code: Option<String>,
    /// Refresh token whose record this issue replaces
    pub rotate_refresh: Option<String>,
    pub parent_id: Option<String>,
}

/// Random material generated by the handler for an [`Issue`].
#[derive(Clone, Debug)]
pub struct Minted {
    pub id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Issue {
    pub fn wants_refresh_token(&self) -> bool {
        self.refresh_lifetime.is_some()
    }

    pub fn into_token(self, minted: Minted) -> AccessToken {
        let refresh_expires_in = minted.refresh_token.as_ref().and(self.refresh_lifetime);
        AccessToken {
            id: minted.id,
            access_token: minted.access_token,
            refresh_token: minted.refresh_token,
            client_id: self.client_id,
            identity: self.identity,
            scope: self.scope,
            redirect_uri: self.redirect_uri,
            created_at: self.issued_at,
            expires_in: self.access_lifetime,
            refresh_expires_in,
            parent_id: self.parent_id,
        }
    }
}

#[derive(Debug)]
pub enum Decision {
    Authorized(Issue),
    Denied(Denial),
}

/// Resolve the `grant_type` parameter against the enabled grants.
pub fn parse_grant_type(policy: &Policy, value: Option<&str>) -> Result<GrantType, Denial> {
    let value = value.ok_or_else(|| Denial::invalid_request("Missing grant_type"))?;
    GrantType::parse(value)
        .filter(|grant| policy.grant_types.contains(grant))
        .ok_or_else(|| {
            Denial::new(
                ErrorCode::UnsupportedGrantType,
                format!("Grant type '{value}' is not supported"),
            )
        })
}

/// Check the presented secret against the registered client.
///
/// Confidential clients must present their secret; public clients must not
/// present one.
pub fn authenticate_client(client: &Client, secret: Option<&str>) -> Result<(), Denial> {
    match (client.secret.as_deref(), secret) {
        (Some(expected), Some(presented)) if expected == presented => Ok(()),
        (None, None) => Ok(()),
        _ => Err(Denial::invalid_client("Client authentication failed")),
    }
}

pub fn evaluate(policy: &Policy, grant: Grant<'_>, now: OffsetDateTime) -> Decision {
    match grant {
        Grant::AuthorizationCode {
            client,
            code,
            redirect_uri,
        } => evaluate_code(policy, client, code, redirect_uri, now),
        Grant::RefreshToken { client, record } => evaluate_refresh(policy, client, record, now),
        Grant::Password {
            client,
            user_id,
            scope,
        } => match user_id {
            Some(user_id) => Decision::Authorized(Issue {
                client_id: client.id.clone(),
                identity: Identity::User(user_id),
                scope: scope.to_string(),
                redirect_uri: client.redirect_uri.clone(),
                issued_at: now,
                access_lifetime: policy.access_lifetime,
                refresh_lifetime: policy.refresh_lifetime,
                consume_code: None,
                rotate_refresh: None,
                parent_id: None,
            }),
            None => Decision::Denied(Denial::invalid_grant(
                "Invalid resource owner credentials",
            )),
        },
        Grant::ClientCredentials { client, scope } => {
            if !client.is_confidential() {
                return Decision::Denied(Denial::new(
                    ErrorCode::UnauthorizedClient,
                    "Public clients may not use the client_credentials grant",
                ));
            }
            Decision::Authorized(Issue {
                client_id: client.id.clone(),
                identity: Identity::None,
                scope: scope.to_string(),
                redirect_uri: client.redirect_uri.clone(),
                issued_at: now,
                access_lifetime: policy.access_lifetime,
                refresh_lifetime: None,
                consume_code: None,
                rotate_refresh: None,
                parent_id: None,
            })
        }
    }
}

fn evaluate_code(
    policy: &Policy,
    client: &Client,
    code: &AuthorizationCode,
    redirect_uri: Option<&str>,
    now: OffsetDateTime,
) -> Decision {
    if code.client_id != client.id {
        return Decision::Denied(Denial::invalid_grant(
            "Authorization code was issued to another client",
        ));
    }
    if code.consumed {
        return Decision::Denied(Denial::invalid_grant(
            "Authorization code has already been used",
        ));
    }
    if code.is_expired_at(now) {
        return Decision::Denied(Denial::invalid_grant("Authorization code has expired"));
    }
    let redirect_uri = redirect_uri.unwrap_or(&client.redirect_uri);
    if redirect_uri != code.redirect_uri {
        return Decision::Denied(Denial::invalid_grant(
            "redirect_uri does not match the authorization request",
        ));
    }
    Decision::Authorized(Issue {
        client_id: client.id.clone(),
        identity: Identity::User(code.user_id.clone()),
        scope: code.scope.clone(),
        redirect_uri: code.redirect_uri.clone(),
        issued_at: now,
        access_lifetime: policy.access_lifetime,
        refresh_lifetime: policy.refresh_lifetime,
        consume_code: Some(code.code.clone()),
        rotate_refresh: None,
        parent_id: None,
    })
}

fn evaluate_refresh(
    policy: &Policy,
    client: &Client,
    record: &AccessToken,
    now: OffsetDateTime,
) -> Decision {
    if record.client_id != client.id {
        return Decision::Denied(Denial::invalid_grant(
            "Refresh token was issued to another client",
        ));
    }
    let Some(refresh_token) = record.refresh_token.clone() else {
        return Decision::Denied(Denial::invalid_grant("Invalid refresh token"));
    };
    if record.is_refresh_expired_at(now) {
        return Decision::Denied(Denial::invalid_grant("Refresh token has expired"));
    }
    Decision::Authorized(Issue {
        client_id: client.id.clone(),
        identity: record.identity.clone(),
        scope: record.scope.clone(),
        redirect_uri: record.redirect_uri.clone(),
        issued_at: now,
        access_lifetime: policy.access_lifetime,
        refresh_lifetime: policy.refresh_lifetime,
        consume_code: None,
        rotate_refresh: Some(refresh_token),
        parent_id: Some(record.id.clone()),
    })
}

/// Parameters of an authorization-endpoint request.
#[derive(Clone, Debug, Default)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
}

/// A validated authorization request, ready for resource-owner approval.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizationTarget {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uri: String,
    pub response_type: ResponseType,
    pub scope: String,
    pub state: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum AuthorizeRejection {
    /// The redirect target cannot be trusted; answer the user agent directly.
    Direct(Denial),
    /// Report back to the client at its verified redirect URI.
    Redirect {
        redirect_uri: String,
        state: Option<String>,
        denial: Denial,
    },
}

/// Validate client and redirect target before anything is shown to the
/// resource owner.
pub fn validate_authorization(
    policy: &Policy,
    client: Option<&Client>,
    params: &AuthorizeParams,
) -> Result<AuthorizationTarget, AuthorizeRejection> {
    if params.client_id.is_none() {
        return Err(AuthorizeRejection::Direct(Denial::invalid_request(
            "Missing client_id",
        )));
    }
    let client = client.ok_or_else(|| {
        AuthorizeRejection::Direct(Denial::invalid_client("Unknown client"))
    })?;
    let redirect_uri = match params.redirect_uri.as_deref() {
        Some(uri) if !client.redirect_uri_matches(uri) => {
            return Err(AuthorizeRejection::Direct(Denial::invalid_request(
                "redirect_uri does not match the registered URI",
            )));
        }
        _ => client.redirect_uri.clone(),
    };
    let reject = |denial| AuthorizeRejection::Redirect {
        redirect_uri: redirect_uri.clone(),
        state: params.state.clone(),
        denial,
    };
    let Some(value) = params.response_type.as_deref() else {
        return Err(reject(Denial::invalid_request("Missing response_type")));
    };
    let response_type = ResponseType::parse(value)
        .filter(|rt| policy.response_types.contains(rt))
        .ok_or_else(|| {
            reject(Denial::new(
                ErrorCode::UnsupportedResponseType,
                format!("Response type '{value}' is not supported"),
            ))
        })?;
    Ok(AuthorizationTarget {
        client_id: client.id.clone(),
        client_name: client.name.clone(),
        redirect_uri,
        response_type,
        scope: params.scope.clone().unwrap_or_default(),
        state: params.state.clone(),
    })
}

/// Outcome of an approved authorization request.
#[derive(Debug, PartialEq)]
pub enum Approval {
    /// `response_type=code`; the handler supplies the code value
    Code(CodeIssue),
    /// `response_type=token`; never carries a refresh token
    Token(Issue),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeIssue {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub issued_at: OffsetDateTime,
    pub lifetime: i64,
}

impl CodeIssue {
    pub fn into_code(self, code: String) -> AuthorizationCode {
        AuthorizationCode {
            code,
            client_id: self.client_id,
            user_id: self.user_id,
            redirect_uri: self.redirect_uri,
            scope: self.scope,
            state: self.state,
            created_at: self.issued_at,
            expires_in: self.lifetime,
            consumed: false,
        }
    }
}

pub fn approve(
    policy: &Policy,
    target: AuthorizationTarget,
    user_id: String,
    now: OffsetDateTime,
) -> Approval {
    match target.response_type {
        ResponseType::Code => Approval::Code(CodeIssue {
            client_id: target.client_id,
            user_id,
            redirect_uri: target.redirect_uri,
            scope: target.scope,
            state: target.state,
            issued_at: now,
            lifetime: policy.code_lifetime,
        }),
        ResponseType::Token => Approval::Token(Issue {
            client_id: target.client_id,
            identity: Identity::User(user_id),
            scope: target.scope,
            redirect_uri: target.redirect_uri,
            issued_at: now,
            access_lifetime: policy.access_lifetime,
            refresh_lifetime: None,
            consume_code: None,
            rotate_refresh: None,
            parent_id: None,
        }),
    }
}
