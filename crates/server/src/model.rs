//! Records owned by the store and handed to handlers as immutable snapshots.

use time::{Duration, OffsetDateTime};

/// Who a code or token speaks for.
///
/// Tokens minted by the client_credentials grant represent the application
/// itself and carry [`Identity::None`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Identity {
    #[default]
    None,
    User(String),
}

impl Identity {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::None => None,
            Identity::User(id) => Some(id),
        }
    }

    pub fn into_user_id(self) -> Option<String> {
        match self {
            Identity::None => None,
            Identity::User(id) => Some(id),
        }
    }

}

impl From<Option<String>> for Identity {
    fn from(user_id: Option<String>) -> Self {
        match user_id {
            Some(id) => Identity::User(id),
            None => Identity::None,
        }
    }
}

/// Instant `lifetime` seconds after `start`, or `None` past the calendar range.
fn deadline(start: OffsetDateTime, lifetime: i64) -> Option<OffsetDateTime> {
    start.checked_add(Duration::seconds(lifetime))
}

/// A registered application.
#[derive(Clone, Debug, PartialEq)]
pub struct Client {
    pub id: String,
    /// Shared secret; `None` marks a public client
    pub secret: Option<String>,
    pub name: String,
    pub redirect_uri: String,
    pub owner_id: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Client {
    pub fn is_confidential(&self) -> bool {
        self.secret.is_some()
    }

    /// Exact comparison, a trailing slash is a different URI.
    pub fn redirect_uri_matches(&self, uri: &str) -> bool {
        self.redirect_uri == uri
    }
}

/// Parameters for registering a client.
#[derive(Clone, Debug, Default)]
pub struct NewClient {
    /// Fixed identifier; a random one is generated when absent
    pub id: Option<String>,
    /// Fixed secret for confidential clients; generated when absent
    pub secret: Option<String>,
    pub name: String,
    pub redirect_uri: String,
    pub owner_id: String,
    pub public: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    /// Redirect URI used at issuance; the exchange must present the same one
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_in: i64,
    pub consumed: bool,
}

impl AuthorizationCode {
    /// `None` when the lifetime runs past the representable range.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        deadline(self.created_at, self.expires_in)
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }
}

/// An access token and, co-located on the same record, its refresh token.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessToken {
    pub id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub identity: Identity,
    pub scope: String,
    pub redirect_uri: String,
    pub created_at: OffsetDateTime,
    pub expires_in: i64,
    pub refresh_expires_in: Option<i64>,
    /// Record whose refresh token was redeemed to mint this one
    pub parent_id: Option<String>,
}

impl AccessToken {
    /// `None` when the lifetime runs past the representable range.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        deadline(self.created_at, self.expires_in)
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }

    /// A record without a refresh token counts as having an expired one.
    pub fn is_refresh_expired_at(&self, now: OffsetDateTime) -> bool {
        match (&self.refresh_token, self.refresh_expires_in) {
            (Some(_), Some(ttl)) => deadline(self.created_at, ttl).is_some_and(|at| now >= at),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn token(refresh: Option<&str>, refresh_ttl: Option<i64>) -> AccessToken {
        AccessToken {
            id: "id".into(),
            access_token: "T1".into(),
            refresh_token: refresh.map(String::from),
            client_id: "1234".into(),
            identity: Identity::User("42".into()),
            scope: "profile:read messages:write".into(),
            redirect_uri: "http://x/callback".into(),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            expires_in: 3600,
            refresh_expires_in: refresh_ttl,
            parent_id: None,
        }
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let t = token(None, None);
        assert!(!t.is_expired_at(datetime!(2026-01-01 00:59:59 UTC)));
        assert!(t.is_expired_at(datetime!(2026-01-01 01:00:00 UTC)));
    }

    #[test]
    fn test_missing_refresh_token_counts_as_expired() {
        let now = datetime!(2026-01-01 00:00:01 UTC);
        assert!(token(None, None).is_refresh_expired_at(now));
        assert!(token(Some("R"), None).is_refresh_expired_at(now));
        assert!(!token(Some("R"), Some(60)).is_refresh_expired_at(now));
    }

    #[test]
    fn test_lifetime_past_calendar_range_never_expires() {
        let mut t = token(Some("R"), Some(i64::MAX));
        t.expires_in = i64::MAX;
        let now = datetime!(2026-01-01 00:00:01 UTC);
        assert_eq!(t.expires_at(), None);
        assert!(!t.is_expired_at(now));
        assert!(!t.is_refresh_expired_at(now));
    }

    #[test]
    fn test_identity_conversions() {
        assert_eq!(Identity::from(None), Identity::None);
        assert_eq!(Identity::from(Some("7".to_string())).user_id(), Some("7"));
        assert_eq!(Identity::User("7".into()).into_user_id(), Some("7".into()));
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = Client {
            id: "1234".into(),
            secret: Some("aabbccdd".into()),
            name: "demo".into(),
            redirect_uri: "http://x/callback".into(),
            owner_id: "1".into(),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            updated_at: datetime!(2026-01-01 00:00:00 UTC),
        };
        assert!(client.redirect_uri_matches("http://x/callback"));
        assert!(!client.redirect_uri_matches("http://x/callback/"));
        assert!(client.is_confidential());
    }
}
