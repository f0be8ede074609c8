//! Creates the authorization server tables.
//!
//! - oauth2_client: registered applications
//! - oauth2_user: resource owners that can log in or use the password grant
//! - oauth2_authorization: single-use authorization codes
//! - oauth2_token: access tokens and their co-located refresh tokens

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuth2Client::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Client::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2Client::Secret).string().null())
                    .col(ColumnDef::new(OAuth2Client::Name).string().not_null())
                    .col(
                        ColumnDef::new(OAuth2Client::RedirectUri)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2Client::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(OAuth2Client::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Client::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2User::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2User::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2User::PasswordHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Authorization::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Authorization::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Authorization::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Authorization::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Authorization::RedirectUri)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2Authorization::Scope).text().not_null())
                    .col(ColumnDef::new(OAuth2Authorization::State).string().null())
                    .col(
                        ColumnDef::new(OAuth2Authorization::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Authorization::ExpiresIn)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Authorization::Consumed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Token::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Token::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::AccessToken)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RefreshToken)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OAuth2Token::ClientId).string().not_null())
                    .col(ColumnDef::new(OAuth2Token::UserId).string().null())
                    .col(ColumnDef::new(OAuth2Token::Scope).text().not_null())
                    .col(
                        ColumnDef::new(OAuth2Token::RedirectUri)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::ExpiresIn)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RefreshExpiresIn)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RevokedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_authorization_client_id")
                    .table(OAuth2Authorization::Table)
                    .col(OAuth2Authorization::ClientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_token_client_id")
                    .table(OAuth2Token::Table)
                    .col(OAuth2Token::ClientId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_oauth2_token_client_id").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth2_authorization_client_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(OAuth2Token::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Authorization::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2User::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Client::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OAuth2Client {
    #[sea_orm(iden = "oauth2_client")]
    Table,
    Id,
    Secret,
    Name,
    RedirectUri,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OAuth2User {
    #[sea_orm(iden = "oauth2_user")]
    Table,
    Id,
    Username,
    PasswordHash,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OAuth2Authorization {
    #[sea_orm(iden = "oauth2_authorization")]
    Table,
    Code,
    ClientId,
    UserId,
    RedirectUri,
    Scope,
    State,
    CreatedAt,
    ExpiresIn,
    Consumed,
}

#[derive(DeriveIden)]
enum OAuth2Token {
    #[sea_orm(iden = "oauth2_token")]
    Table,
    Id,
    AccessToken,
    RefreshToken,
    ClientId,
    UserId,
    Scope,
    RedirectUri,
    CreatedAt,
    ExpiresIn,
    RefreshExpiresIn,
    RevokedAt,
}
