use axum::http::StatusCode;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Failures reported by a [`Storage`](crate::store::Storage) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record expired")]
    Expired,
    #[error("record already consumed")]
    AlreadyConsumed,
    #[error("record already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("random source unavailable: {0}")]
    Random(#[from] getrandom::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl StoreError {
    /// Whether the caller is looking at an invalid credential rather than a
    /// broken backend.
    pub fn is_invalid_credential(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound | StoreError::Expired | StoreError::AlreadyConsumed
        )
    }
}

/// Standard OAuth2 error codes emitted by the protocol endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    UnsupportedResponseType,
    AccessDenied,
    InvalidToken,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidClient => "invalid_client",
            ErrorCode::InvalidGrant => "invalid_grant",
            ErrorCode::UnauthorizedClient => "unauthorized_client",
            ErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            ErrorCode::UnsupportedResponseType => "unsupported_response_type",
            ErrorCode::AccessDenied => "access_denied",
            ErrorCode::InvalidToken => "invalid_token",
            ErrorCode::ServerError => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidClient | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused request, safe to show to the client verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{code}: {description}")]
pub struct Denial {
    pub code: ErrorCode,
    pub description: String,
}

impl Denial {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidClient, description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, description)
    }

    /// The opaque error handed out for infrastructure failures.
    pub fn server_error() -> Self {
        Self::new(ErrorCode::ServerError, "The server encountered an internal error")
    }
}

/// JSON body of every OAuth2 error response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&Denial> for ErrorResponse {
    fn from(denial: &Denial) -> Self {
        Self {
            error: denial.code.as_str().to_string(),
            error_description: Some(denial.description.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::InvalidClient.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidGrant.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::ServerError.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_code_serializes_as_oauth_string() {
        let json = serde_json::to_string(&ErrorCode::UnsupportedGrantType).unwrap();
        assert_eq!(json, "\"unsupported_grant_type\"");
        assert_eq!(ErrorCode::UnsupportedGrantType.as_str(), "unsupported_grant_type");
    }

    #[test]
    fn test_server_error_is_generic() {
        let denial = Denial::server_error();
        assert!(!denial.description.to_lowercase().contains("database"));
    }
}
