use sea_orm::{entity::prelude::*, sea_query::Expr, Condition, DatabaseConnection, QueryFilter, Set};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub verification_sent_at: Option<DateTimeWithTimeZone>,
    pub resend_attempts: i32,
    pub last_resend_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Columns needed to insert a new, unverified user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

pub async fn create(db: &DatabaseConnection, input: NewUser) -> Result<Model, ModelError> {
    if !input.email.contains('@') { return Err(ModelError::Validation("invalid email".into())); }
    if input.username.trim().is_empty() { return Err(ModelError::Validation("username required".into())); }
    if input.password_hash.trim().is_empty() { return Err(ModelError::Validation("password hash required".into())); }
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(input.username),
        name: Set(input.name),
        email: Set(input.email),
        password_hash: Set(input.password_hash),
        verified: Set(false),
        verification_code: Set(None),
        verification_sent_at: Set(None),
        resend_attempts: Set(0),
        last_resend_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(am.insert(db).await?)
}

pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Email.eq(email)).one(db).await?)
}

pub async fn find_by_username(db: &DatabaseConnection, username: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Username.eq(username)).one(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

/// Store a freshly issued code and reset resend bookkeeping.
pub async fn set_verification_code(
    db: &DatabaseConnection,
    id: Uuid,
    code: &str,
    sent_at: DateTime<Utc>,
) -> Result<bool, ModelError> {
    let sent_at: DateTimeWithTimeZone = sent_at.into();
    let res = Entity::update_many()
        .col_expr(Column::VerificationCode, Expr::value(code))
        .col_expr(Column::VerificationSentAt, Expr::value(sent_at))
        .col_expr(Column::ResendAttempts, Expr::value(0))
        .col_expr(Column::LastResendAt, Expr::value(Option::<DateTimeWithTimeZone>::None))
        .col_expr(Column::UpdatedAt, Expr::value(sent_at))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}

/// Mark the user verified if `code` matches and was sent at or after `not_before`.
///
/// A single guarded UPDATE: of two concurrent callers with the right code only one
/// sees `true`.
pub async fn complete_verification(
    db: &DatabaseConnection,
    id: Uuid,
    code: &str,
    not_before: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool, ModelError> {
    let not_before: DateTimeWithTimeZone = not_before.into();
    let now: DateTimeWithTimeZone = now.into();
    let res = Entity::update_many()
        .col_expr(Column::Verified, Expr::value(true))
        .col_expr(Column::VerificationCode, Expr::value(Option::<String>::None))
        .col_expr(Column::VerificationSentAt, Expr::value(Option::<DateTimeWithTimeZone>::None))
        .col_expr(Column::ResendAttempts, Expr::value(0))
        .col_expr(Column::LastResendAt, Expr::value(Option::<DateTimeWithTimeZone>::None))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .filter(Column::Verified.eq(false))
        .filter(Column::VerificationCode.eq(code))
        .filter(Column::VerificationSentAt.gte(not_before))
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}

/// Replace the code and count a resend, guarded by the attempt cap and cooldown.
pub async fn record_resend(
    db: &DatabaseConnection,
    id: Uuid,
    code: &str,
    now: DateTime<Utc>,
    max_attempts: i32,
    cooldown_cutoff: DateTime<Utc>,
) -> Result<bool, ModelError> {
    let now: DateTimeWithTimeZone = now.into();
    let cutoff: DateTimeWithTimeZone = cooldown_cutoff.into();
    let res = Entity::update_many()
        .col_expr(Column::VerificationCode, Expr::value(code))
        .col_expr(Column::VerificationSentAt, Expr::value(now))
        .col_expr(Column::LastResendAt, Expr::value(now))
        .col_expr(Column::ResendAttempts, Expr::col(Column::ResendAttempts).add(1))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .filter(Column::Verified.eq(false))
        .filter(Column::ResendAttempts.lt(max_attempts))
        .filter(
            Condition::any()
                .add(Column::LastResendAt.is_null())
                .add(Column::LastResendAt.lte(cutoff)),
        )
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}

pub async fn update_password(db: &DatabaseConnection, id: Uuid, password_hash: String) -> Result<bool, ModelError> {
    if password_hash.trim().is_empty() {
        return Err(ModelError::Validation("password hash required".into()));
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let res = Entity::update_many()
        .col_expr(Column::PasswordHash, Expr::value(password_hash))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}
