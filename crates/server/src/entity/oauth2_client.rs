//! OAuth2 Client entity.

use crate::model::Client;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_client")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Client secret (None for public clients)
    pub secret: Option<String>,
    /// Human-readable client name
    pub name: String,
    /// The single registered redirect URI, compared byte for byte
    pub redirect_uri: String,
    /// User that registered the application
    pub owner_id: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Client {
    fn from(model: Model) -> Self {
        Client {
            id: model.id,
            secret: model.secret,
            name: model.name,
            redirect_uri: model.redirect_uri,
            owner_id: model.owner_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
