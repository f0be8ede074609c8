//! SeaORM-backed [`Storage`] and [`CredentialVerifier`].

use super::{CredentialVerifier, Storage};
use crate::entity::{oauth2_authorization, oauth2_client, oauth2_token, oauth2_user};
use crate::error::StoreError;
use crate::model::{AccessToken, AuthorizationCode, Client, NewClient};
use crate::oauth2::password::{generate_token, hash_password, verify_password};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct DbStorage {
    db: Arc<DatabaseConnection>,
}

fn insert_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict,
        _ => StoreError::Database(err),
    }
}

impl DbStorage {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Register a resource owner with an Argon2id password hash.
    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(&self, username: &str, password: &str) -> Result<String, StoreError> {
        let password_hash =
            hash_password(password).map_err(|e| StoreError::PasswordHash(e.to_string()))?;
        let user = oauth2_user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            created_at: Set(OffsetDateTime::now_utc()),
        };
        let user = user.insert(self.db.as_ref()).await.map_err(insert_error)?;
        tracing::info!(user_id = %user.id, "Created resource owner");
        Ok(user.id)
    }

    pub async fn find_user_id(&self, username: &str) -> Result<Option<String>, StoreError> {
        Ok(oauth2_user::Entity::find()
            .filter(oauth2_user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?
            .map(|user| user.id))
    }

    async fn token_record(&self, token: &str) -> Result<Option<oauth2_token::Model>, DbErr> {
        oauth2_token::Entity::find()
            .filter(oauth2_token::Column::AccessToken.eq(token))
            .one(self.db.as_ref())
            .await
    }

    async fn refresh_record(
        &self,
        refresh_token: &str,
    ) -> Result<Option<oauth2_token::Model>, DbErr> {
        oauth2_token::Entity::find()
            .filter(oauth2_token::Column::RefreshToken.eq(refresh_token))
            .one(self.db.as_ref())
            .await
    }
}

#[async_trait]
impl Storage for DbStorage {
    async fn get_client(&self, id: &str) -> Result<Client, StoreError> {
        oauth2_client::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Client::from)
            .ok_or(StoreError::NotFound)
    }

    #[tracing::instrument(skip(self, client), fields(name = %client.name))]
    async fn create_client(&self, client: NewClient) -> Result<Client, StoreError> {
        let id = match client.id {
            Some(id) => id,
            None => generate_token()?,
        };
        let secret = match (client.public, client.secret) {
            (true, _) => None,
            (false, Some(secret)) => Some(secret),
            (false, None) => Some(generate_token()?),
        };
        let now = OffsetDateTime::now_utc();
        let model = oauth2_client::ActiveModel {
            id: Set(id),
            secret: Set(secret),
            name: Set(client.name),
            redirect_uri: Set(client.redirect_uri),
            owner_id: Set(client.owner_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = model.insert(self.db.as_ref()).await.map_err(insert_error)?;
        tracing::info!(client_id = %model.id, "Registered OAuth2 client");
        Ok(model.into())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_client(&self, id: &str) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;
        let removed = oauth2_client::Entity::delete_by_id(id).exec(&txn).await?;
        if removed.rows_affected == 0 {
            txn.rollback().await?;
            return Err(StoreError::NotFound);
        }
        let codes = oauth2_authorization::Entity::delete_many()
            .filter(oauth2_authorization::Column::ClientId.eq(id))
            .exec(&txn)
            .await?;
        let tokens = oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::ClientId.eq(id))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        tracing::info!(
            codes = codes.rows_affected,
            tokens = tokens.rows_affected,
            "Removed OAuth2 client"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn rotate_client_secret(&self, id: &str) -> Result<Client, StoreError> {
        let client = oauth2_client::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(StoreError::NotFound)?;
        let mut active: oauth2_client::ActiveModel = client.into();
        active.secret = Set(Some(generate_token()?));
        active.updated_at = Set(OffsetDateTime::now_utc());
        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    async fn save_authorization_code(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        oauth2_authorization::ActiveModel::from(code)
            .insert(self.db.as_ref())
            .await
            .map_err(insert_error)?;
        Ok(())
    }

    async fn load_authorization_code(&self, code: &str) -> Result<AuthorizationCode, StoreError> {
        oauth2_authorization::Entity::find_by_id(code)
            .one(self.db.as_ref())
            .await?
            .map(AuthorizationCode::from)
            .ok_or(StoreError::NotFound)
    }

    async fn consume_authorization_code(&self, code: &str) -> Result<(), StoreError> {
        // Conditional update; the WHERE clause is the serialization point.
        let result = oauth2_authorization::Entity::update_many()
            .col_expr(oauth2_authorization::Column::Consumed, Expr::value(true))
            .filter(oauth2_authorization::Column::Code.eq(code))
            .filter(oauth2_authorization::Column::Consumed.eq(false))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 1 {
            return Ok(());
        }
        match oauth2_authorization::Entity::find_by_id(code)
            .one(self.db.as_ref())
            .await?
        {
            Some(_) => Err(StoreError::AlreadyConsumed),
            None => Err(StoreError::NotFound),
        }
    }

    async fn save_access_token(&self, token: AccessToken) -> Result<(), StoreError> {
        oauth2_token::ActiveModel::from(token)
            .insert(self.db.as_ref())
            .await
            .map_err(insert_error)?;
        Ok(())
    }

    async fn load_access_token(&self, token: &str) -> Result<AccessToken, StoreError> {
        let record = self
            .token_record(token)
            .await?
            .filter(|record| !record.is_revoked())
            .ok_or(StoreError::NotFound)?;
        let token = AccessToken::from(record);
        if token.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(StoreError::Expired);
        }
        Ok(token)
    }

    async fn load_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<AccessToken, StoreError> {
        let record = self
            .refresh_record(refresh_token)
            .await?
            .filter(|record| !record.is_refresh_revoked())
            .ok_or(StoreError::NotFound)?;
        let token = AccessToken::from(record);
        if token.is_refresh_expired_at(OffsetDateTime::now_utc()) {
            return Err(StoreError::Expired);
        }
        Ok(token)
    }

    async fn revoke_access_token(&self, token: &str) -> Result<(), StoreError> {
        oauth2_token::Entity::update_many()
            .col_expr(
                oauth2_token::Column::RevokedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(oauth2_token::Column::AccessToken.eq(token))
            .filter(oauth2_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        oauth2_token::Entity::update_many()
            .col_expr(oauth2_token::Column::RevokedAt, Expr::value(now))
            .col_expr(oauth2_token::Column::RefreshRevokedAt, Expr::value(now))
            .filter(oauth2_token::Column::RefreshToken.eq(refresh_token))
            .filter(oauth2_token::Column::RefreshRevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        old_refresh_token: &str,
        next: AccessToken,
    ) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let txn = self.db.begin().await?;
        let retired = oauth2_token::Entity::update_many()
            .col_expr(oauth2_token::Column::RevokedAt, Expr::value(now))
            .col_expr(oauth2_token::Column::RefreshRevokedAt, Expr::value(now))
            .filter(oauth2_token::Column::RefreshToken.eq(old_refresh_token))
            .filter(oauth2_token::Column::RefreshRevokedAt.is_null())
            .exec(&txn)
            .await?;
        if retired.rows_affected == 0 {
            txn.rollback().await?;
            return match self.refresh_record(old_refresh_token).await? {
                Some(_) => Err(StoreError::AlreadyConsumed),
                None => Err(StoreError::NotFound),
            };
        }
        oauth2_token::ActiveModel::from(next)
            .insert(&txn)
            .await
            .map_err(insert_error)?;
        txn.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialVerifier for DbStorage {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<String>, StoreError> {
        let Some(user) = oauth2_user::Entity::find()
            .filter(oauth2_user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash) {
            Ok(Some(user.id))
        } else {
            Ok(None)
        }
    }
}
