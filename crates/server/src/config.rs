use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// `response_type` values accepted at the authorization endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
    Token,
}

impl ResponseType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(ResponseType::Code),
            "token" => Some(ResponseType::Token),
            _ => None,
        }
    }
}

/// `grant_type` values accepted at the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    Password,
    ClientCredentials,
}

impl GrantType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(GrantType::AuthorizationCode),
            "refresh_token" => Some(GrantType::RefreshToken),
            "password" => Some(GrantType::Password),
            "client_credentials" => Some(GrantType::ClientCredentials),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

/// Lifetimes (seconds) and feature switches of the authorization server.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    pub authorization_code_lifetime: i64,
    pub access_token_lifetime: i64,
    pub refresh_token_lifetime: i64,
    pub issue_refresh_tokens: bool,
    pub allowed_response_types: Vec<ResponseType>,
    pub allowed_grant_types: Vec<GrantType>,
    /// Accept token requests sent as GET with query parameters
    pub allow_get_access_request: bool,
    /// Accept `client_id`/`client_secret` as request parameters besides Basic auth
    pub allow_client_secret_in_params: bool,
    /// Seconds a request may run before it is answered with `server_error`
    pub request_timeout: u64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: 250,
            access_token_lifetime: 3600,
            refresh_token_lifetime: 14 * 24 * 3600,
            issue_refresh_tokens: true,
            allowed_response_types: vec![ResponseType::Code, ResponseType::Token],
            allowed_grant_types: vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::Password,
                GrantType::ClientCredentials,
            ],
            allow_get_access_request: true,
            allow_client_secret_in_params: true,
            request_timeout: 30,
        }
    }
}

/// Manual-testing pages under `/app` and `/appauth/*`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub scope: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: "1234".to_string(),
            client_secret: "aabbccdd".to_string(),
            username: "test".to_string(),
            password: "test".to_string(),
            scope: "everything".to_string(),
        }
    }
}

/// Upper bound for any configured lifetime, ten years in seconds.
pub const MAX_LIFETIME: i64 = 10 * 365 * 24 * 3600;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Public base URL of this server, used by the demo pages to call back into it
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    #[serde(default)]
    pub oauth2: OAuth2Config,
    #[serde(default)]
    pub demo: DemoConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// A configuration with every optional field at its default.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            listen_addr: default_listen_addr(),
            api_url: default_api_url(),
            run_migrations: true,
            oauth2: OAuth2Config::default(),
            demo: DemoConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetimes = [
            ("authorization_code_lifetime", self.oauth2.authorization_code_lifetime),
            ("access_token_lifetime", self.oauth2.access_token_lifetime),
            ("refresh_token_lifetime", self.oauth2.refresh_token_lifetime),
        ];
        for (name, value) in lifetimes {
            if value <= 0 {
                return Err(ConfigError::Validation(format!(
                    "oauth2.{name} must be > 0"
                )));
            }
            if value > MAX_LIFETIME {
                return Err(ConfigError::Validation(format!(
                    "oauth2.{name} must be at most {MAX_LIFETIME} seconds"
                )));
            }
        }
        if self.oauth2.request_timeout == 0 {
            return Err(ConfigError::Validation(
                "oauth2.request_timeout must be > 0".into(),
            ));
        }
        if self.oauth2.allowed_grant_types.is_empty() {
            return Err(ConfigError::Validation(
                "oauth2.allowed_grant_types must not be empty".into(),
            ));
        }
        if let Err(e) = url::Url::parse(&self.api_url) {
            return Err(ConfigError::Validation(format!("api_url is invalid: {e}")));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `OAUTH2__ACCESS_TOKEN_LIFETIME`) overrides the file value. A `.env`
/// file in the working directory is read first.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let _ = dotenvy::dotenv();
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;
    from_config(cfg)
}

/// Deserialize and validate an already assembled [`config::Config`].
pub fn from_config(cfg: config::Config) -> Result<AppConfig, ConfigError> {
    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn parse(yaml: &str) -> Result<AppConfig, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        from_config(cfg)
    }

    #[test]
    fn defaults_apply() {
        let app = parse("database_url: 'sqlite::memory:'").unwrap();
        assert_eq!(app.listen_addr, "0.0.0.0:8080");
        assert_eq!(app.oauth2.authorization_code_lifetime, 250);
        assert_eq!(app.oauth2.access_token_lifetime, 3600);
        assert_eq!(app.oauth2.refresh_token_lifetime, 1_209_600);
        assert_eq!(app.oauth2.request_timeout, 30);
        assert!(app.oauth2.allowed_grant_types.contains(&GrantType::ClientCredentials));
        assert!(!app.demo.enabled);
        assert_eq!(app.demo.client_id, "1234");
    }

    #[test]
    fn nested_overrides() {
        let app = parse(
            "database_url: 'sqlite::memory:'\noauth2:\n  access_token_lifetime: 60\n  allowed_grant_types: [password]\n",
        )
        .unwrap();
        assert_eq!(app.oauth2.access_token_lifetime, 60);
        assert!(app.oauth2.allowed_grant_types.contains(&GrantType::Password));
        assert!(!app.oauth2.allowed_grant_types.contains(&GrantType::RefreshToken));
        // untouched siblings keep their defaults
        assert_eq!(app.oauth2.authorization_code_lifetime, 250);
    }

    #[test]
    fn rejects_non_positive_lifetime() {
        let err = parse("database_url: x\noauth2:\n  access_token_lifetime: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_lifetime_beyond_ceiling() {
        let err = parse(
            "database_url: x\noauth2:\n  access_token_lifetime: 9223372036854775807\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let at_ceiling =
            format!("database_url: x\noauth2:\n  refresh_token_lifetime: {MAX_LIFETIME}\n");
        assert!(parse(&at_ceiling).is_ok());
    }

    #[test]
    fn rejects_zero_request_timeout() {
        let err = parse("database_url: x\noauth2:\n  request_timeout: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_empty_grant_list() {
        let err = parse("database_url: x\noauth2:\n  allowed_grant_types: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_bad_api_url() {
        let err = parse("database_url: x\napi_url: 'not a url'\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_database_url_is_build_error() {
        assert!(matches!(parse("listen_addr: x"), Err(ConfigError::Build(_))));
    }

    #[test]
    fn parses_grant_and_response_types() {
        assert_eq!(GrantType::parse("password"), Some(GrantType::Password));
        assert_eq!(GrantType::parse("implicit"), None);
        assert_eq!(ResponseType::parse("token"), Some(ResponseType::Token));
        assert_eq!(ResponseType::parse("id_token"), None);
    }
}
