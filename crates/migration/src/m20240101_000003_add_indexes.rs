use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Blacklist pruning scans by expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_blacklisted_tokens_expires_at")
                    .table(BlacklistedTokens::Table)
                    .col(BlacklistedTokens::ExpiresAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Unverified accounts are looked up by email on verify/resend
        manager
            .create_index(
                Index::create()
                    .name("idx_users_verified")
                    .table(Users::Table)
                    .col(Users::Verified)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_users_verified").table(Users::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_blacklisted_tokens_expires_at")
                    .table(BlacklistedTokens::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Verified,
}

#[derive(DeriveIden)]
enum BlacklistedTokens {
    Table,
    ExpiresAt,
}
