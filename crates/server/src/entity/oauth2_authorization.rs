//! OAuth2 Authorization Code entity - single-use codes exchanged for tokens.

use crate::model::AuthorizationCode;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_authorization")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub created_at: OffsetDateTime,
    /// Lifetime in seconds, counted from `created_at`
    pub expires_in: i64,
    pub consumed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for AuthorizationCode {
    fn from(model: Model) -> Self {
        AuthorizationCode {
            code: model.code,
            client_id: model.client_id,
            user_id: model.user_id,
            redirect_uri: model.redirect_uri,
            scope: model.scope,
            state: model.state,
            created_at: model.created_at,
            expires_in: model.expires_in,
            consumed: model.consumed,
        }
    }
}

impl From<AuthorizationCode> for ActiveModel {
    fn from(code: AuthorizationCode) -> Self {
        use sea_orm::ActiveValue::Set;
        ActiveModel {
            code: Set(code.code),
            client_id: Set(code.client_id),
            user_id: Set(code.user_id),
            redirect_uri: Set(code.redirect_uri),
            scope: Set(code.scope),
            state: Set(code.state),
            created_at: Set(code.created_at),
            expires_in: Set(code.expires_in),
            consumed: Set(code.consumed),
        }
    }
}
