use sea_orm::entity::prelude::*;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, QueryFilter, Set};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// A revoked bearer token. Not linked to `users`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blacklisted_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub token: String,
    /// The token's own `exp`; rows past it can be pruned.
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub async fn exists(db: &DatabaseConnection, token: &str) -> Result<bool, ModelError> {
    Ok(Entity::find_by_id(token.to_string()).one(db).await?.is_some())
}

/// Insert-or-ignore. Returns `true` when a new row was written.
pub async fn insert_ignore(
    db: &DatabaseConnection,
    token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<bool, ModelError> {
    let am = ActiveModel {
        token: Set(token.to_string()),
        expires_at: Set(expires_at.map(Into::into)),
        created_at: Set(Utc::now().into()),
    };
    let inserted = Entity::insert(am)
        .on_conflict(OnConflict::column(Column::Token).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

pub async fn remove(db: &DatabaseConnection, token: &str) -> Result<bool, ModelError> {
    let res = Entity::delete_by_id(token.to_string()).exec(db).await?;
    Ok(res.rows_affected > 0)
}

/// Delete entries whose token expired before `now`.
pub async fn prune_expired(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, ModelError> {
    let now: DateTimeWithTimeZone = now.into();
    let res = Entity::delete_many()
        .filter(Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
