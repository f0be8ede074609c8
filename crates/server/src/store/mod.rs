//! Persistence of clients, authorization codes and tokens.
//!
//! The store is the only component allowed to mutate persisted state. Every
//! call goes to the backing database; validity of codes and tokens is never
//! cached in process, so a consumed code or a revoked token is seen as such by
//! the very next request.

mod db;

pub use db::DbStorage;

use crate::error::StoreError;
use crate::model::{AccessToken, AuthorizationCode, Client, NewClient};
use async_trait::async_trait;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_client(&self, id: &str) -> Result<Client, StoreError>;

    /// Register a client, generating the identifier and secret where the
    /// caller left them open. Fails with `Conflict` if the id is taken.
    async fn create_client(&self, client: NewClient) -> Result<Client, StoreError>;

    /// Delete a client together with its codes and tokens.
    async fn remove_client(&self, id: &str) -> Result<(), StoreError>;

    async fn rotate_client_secret(&self, id: &str) -> Result<Client, StoreError>;

    async fn save_authorization_code(&self, code: AuthorizationCode) -> Result<(), StoreError>;

    /// Load a code as stored, consumed or expired ones included.
    async fn load_authorization_code(&self, code: &str) -> Result<AuthorizationCode, StoreError>;

    /// Mark a code as used.
    ///
    /// Concurrent calls for the same code are linearized: exactly one returns
    /// `Ok`, the others get `AlreadyConsumed`.
    async fn consume_authorization_code(&self, code: &str) -> Result<(), StoreError>;

    async fn save_access_token(&self, token: AccessToken) -> Result<(), StoreError>;

    /// Resolve a live access token. Revoked tokens are `NotFound`, expired
    /// ones `Expired`.
    async fn load_access_token(&self, token: &str) -> Result<AccessToken, StoreError>;

    /// Resolve the record holding a live refresh token.
    async fn load_by_refresh_token(&self, refresh_token: &str)
    -> Result<AccessToken, StoreError>;

    async fn revoke_access_token(&self, token: &str) -> Result<(), StoreError>;

    /// Retire a refresh token together with the access token on the same
    /// record, in a single write.
    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), StoreError>;

    /// Invalidate the record owning `old_refresh_token` and persist `next` in
    /// its place, atomically. A second rotation of the same refresh token
    /// gets `AlreadyConsumed`.
    async fn rotate_refresh_token(
        &self,
        old_refresh_token: &str,
        next: AccessToken,
    ) -> Result<(), StoreError>;
}

/// Checks resource-owner credentials against the identity store.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// The stable user id for a matching username/password pair.
    async fn verify(&self, username: &str, password: &str) -> Result<Option<String>, StoreError>;
}
