use config::{Config, File, FileFormat};
use oauth2_server::config::{GrantType, ResponseType, from_config};

#[test]
fn test_full_config_file() {
    let yaml_content = r#"
database_url: "postgres://localhost/oauth2"
listen_addr: "127.0.0.1:9000"
api_url: "https://auth.example.com"
run_migrations: false
oauth2:
  authorization_code_lifetime: 120
  access_token_lifetime: 900
  refresh_token_lifetime: 86400
  issue_refresh_tokens: false
  allowed_response_types: [code]
  allowed_grant_types: [authorization_code, client_credentials]
  allow_get_access_request: false
  allow_client_secret_in_params: false
demo:
  enabled: true
  client_id: "demo"
  client_secret: "s3cret"
"#;

    let cfg = Config::builder()
        .add_source(File::from_str(yaml_content, FileFormat::Yaml))
        .build()
        .expect("Failed to build config");
    let app = from_config(cfg).expect("valid config");

    assert_eq!(app.database_url, "postgres://localhost/oauth2");
    assert_eq!(app.listen_addr, "127.0.0.1:9000");
    assert!(!app.run_migrations);
    assert_eq!(app.oauth2.authorization_code_lifetime, 120);
    assert_eq!(app.oauth2.access_token_lifetime, 900);
    assert!(!app.oauth2.issue_refresh_tokens);
    assert_eq!(app.oauth2.allowed_response_types, vec![ResponseType::Code]);
    assert!(app.oauth2.allowed_grant_types.contains(&GrantType::ClientCredentials));
    assert!(!app.oauth2.allowed_grant_types.contains(&GrantType::Password));
    assert!(!app.oauth2.allow_get_access_request);
    assert!(app.demo.enabled);
    assert_eq!(app.demo.client_id, "demo");
    // unspecified demo fields keep their defaults
    assert_eq!(app.demo.username, "test");
    assert_eq!(app.demo.scope, "everything");
}

#[test]
fn test_unknown_grant_type_is_rejected() {
    let yaml_content = r#"
database_url: "sqlite::memory:"
oauth2:
  allowed_grant_types: [implicit]
"#;
    let cfg = Config::builder()
        .add_source(File::from_str(yaml_content, FileFormat::Yaml))
        .build()
        .expect("Failed to build config");
    assert!(from_config(cfg).is_err());
}
