//! The authorization server object shared by every handler.

use crate::config::OAuth2Config;
use crate::oauth2::grant::Policy;
use crate::oauth2::login::{PasswordLogin, ResourceOwnerLogin};
use crate::store::{CredentialVerifier, DbStorage, Storage};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Constructed once at startup and handed to the router as state.
#[derive(Clone)]
pub struct OAuth2Server {
    pub config: Arc<OAuth2Config>,
    pub policy: Arc<Policy>,
    pub store: Arc<dyn Storage>,
    pub login: Arc<dyn ResourceOwnerLogin>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl OAuth2Server {
    pub fn new(
        config: OAuth2Config,
        store: Arc<dyn Storage>,
        login: Arc<dyn ResourceOwnerLogin>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            policy: Arc::new(Policy::from(&config)),
            config: Arc::new(config),
            store,
            login,
            verifier,
        }
    }

    /// Database-backed store, with the user table as identity store and the
    /// password form as login page.
    pub fn with_database(config: OAuth2Config, db: Arc<DatabaseConnection>) -> Self {
        let storage = Arc::new(DbStorage::new(db));
        let login = Arc::new(PasswordLogin::new(storage.clone()));
        Self::new(config, storage.clone(), login, storage)
    }
}
