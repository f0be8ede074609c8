//! Tracks refresh tokens separately from their access token.
//!
//! - refresh_revoked_at: set when the refresh token is redeemed or revoked
//! - parent_id: the record whose refresh token minted this one

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(OAuth2Token::Table)
                    .add_column(
                        ColumnDef::new(OAuth2Token::RefreshRevokedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(OAuth2Token::Table)
                    .add_column(ColumnDef::new(OAuth2Token::ParentId).string().null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(OAuth2Token::Table)
                    .drop_column(OAuth2Token::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(OAuth2Token::Table)
                    .drop_column(OAuth2Token::RefreshRevokedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OAuth2Token {
    #[sea_orm(iden = "oauth2_token")]
    Table,
    RefreshRevokedAt,
    ParentId,
}
