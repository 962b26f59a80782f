//! Create `users` table.
//!
//! Holds credentials plus the email verification bookkeeping
//! (`verification_code`, `verification_sent_at`, `resend_attempts`, `last_resend_at`).
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid(Users::Id).primary_key())
                    .col(string_len(Users::Username, 50).unique_key().not_null())
                    .col(string_len(Users::Name, 50).not_null())
                    .col(string_len(Users::Email, 255).unique_key().not_null())
                    .col(string_len(Users::PasswordHash, 255).not_null())
                    .col(boolean(Users::Verified).default(false).not_null())
                    .col(ColumnDef::new(Users::VerificationCode).string_len(6).null())
                    .col(
                        ColumnDef::new(Users::VerificationSentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(integer(Users::ResendAttempts).default(0).not_null())
                    .col(
                        ColumnDef::new(Users::LastResendAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(timestamp_with_time_zone(Users::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Users::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Name,
    Email,
    PasswordHash,
    Verified,
    VerificationCode,
    VerificationSentAt,
    ResendAttempts,
    LastResendAt,
    CreatedAt,
    UpdatedAt,
}
