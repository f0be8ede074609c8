//! OAuth2 Token entity - an access token and its optional refresh token.

use crate::model::{AccessToken, Identity};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub access_token: String,
    #[sea_orm(unique)]
    pub refresh_token: Option<String>,
    pub client_id: String,
    /// None for tokens minted by the client_credentials grant
    pub user_id: Option<String>,
    pub scope: String,
    pub redirect_uri: String,
    pub created_at: OffsetDateTime,
    pub expires_in: i64,
    pub refresh_expires_in: Option<i64>,
    pub revoked_at: Option<OffsetDateTime>,
    pub refresh_revoked_at: Option<OffsetDateTime>,
    pub parent_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Check if this access token has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check if the refresh half of this record has been redeemed or revoked
    pub fn is_refresh_revoked(&self) -> bool {
        self.refresh_revoked_at.is_some()
    }
}

impl From<Model> for AccessToken {
    fn from(model: Model) -> Self {
        AccessToken {
            id: model.id,
            access_token: model.access_token,
            refresh_token: model.refresh_token,
            client_id: model.client_id,
            identity: Identity::from(model.user_id),
            scope: model.scope,
            redirect_uri: model.redirect_uri,
            created_at: model.created_at,
            expires_in: model.expires_in,
            refresh_expires_in: model.refresh_expires_in,
            parent_id: model.parent_id,
        }
    }
}

impl From<AccessToken> for ActiveModel {
    fn from(token: AccessToken) -> Self {
        use sea_orm::ActiveValue::Set;
        ActiveModel {
            id: Set(token.id),
            access_token: Set(token.access_token),
            refresh_token: Set(token.refresh_token),
            client_id: Set(token.client_id),
            user_id: Set(token.identity.into_user_id()),
            scope: Set(token.scope),
            redirect_uri: Set(token.redirect_uri),
            created_at: Set(token.created_at),
            expires_in: Set(token.expires_in),
            refresh_expires_in: Set(token.refresh_expires_in),
            revoked_at: Set(None),
            refresh_revoked_at: Set(None),
            parent_id: Set(token.parent_id),
        }
    }
}
