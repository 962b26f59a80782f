//! Create `blacklisted_tokens` table.
//!
//! Keyed purely on the token value; no FK to `users`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlacklistedTokens::Table)
                    .if_not_exists()
                    .col(text(BlacklistedTokens::Token).primary_key())
                    .col(
                        ColumnDef::new(BlacklistedTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(timestamp_with_time_zone(BlacklistedTokens::CreatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlacklistedTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BlacklistedTokens {
    Table,
    Token,
    ExpiresAt,
    CreatedAt,
}
