use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::domain::{NewUserRecord, ResendGuard, UserRecord};
use crate::auth::errors::AuthError;
use crate::auth::repository::AuthRepository;
use models::{blacklisted_token, user};

pub struct SeaOrmAuthRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmAuthRepository {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn to_record(u: user::Model) -> UserRecord {
    UserRecord {
        id: u.id,
        username: u.username,
        name: u.name,
        email: u.email,
        password_hash: u.password_hash,
        verified: u.verified,
        verification_code: u.verification_code,
        verification_sent_at: u.verification_sent_at.map(|t| t.with_timezone(&Utc)),
        resend_attempts: u.resend_attempts,
        last_resend_at: u.last_resend_at.map(|t| t.with_timezone(&Utc)),
        created_at: u.created_at.with_timezone(&Utc),
    }
}

#[async_trait::async_trait]
impl AuthRepository for SeaOrmAuthRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(user::find_by_email(&self.db, email).await?.map(to_record))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(user::find_by_username(&self.db, username).await?.map(to_record))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        Ok(user::find_by_id(&self.db, id).await?.map(to_record))
    }

    async fn create_user(&self, input: NewUserRecord) -> Result<UserRecord, AuthError> {
        let created = user::create(
            &self.db,
            user::NewUser {
                username: input.username,
                name: input.name,
                email: input.email,
                password_hash: input.password_hash,
            },
        )
        .await?;
        Ok(to_record(created))
    }

    async fn store_verification_code(&self, user_id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<(), AuthError> {
        if !user::set_verification_code(&self.db, user_id, code, sent_at).await? {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn complete_verification(
        &self,
        user_id: Uuid,
        code: &str,
        not_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        Ok(user::complete_verification(&self.db, user_id, code, not_before, now).await?)
    }

    async fn record_resend(&self, user_id: Uuid, code: &str, now: DateTime<Utc>, guard: ResendGuard) -> Result<bool, AuthError> {
        Ok(user::record_resend(&self.db, user_id, code, now, guard.max_attempts, guard.cooldown_cutoff).await?)
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<(), AuthError> {
        if !user::update_password(&self.db, user_id, password_hash).await? {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AuthError> {
        Ok(blacklisted_token::exists(&self.db, token).await?)
    }

    async fn blacklist_token(&self, token: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool, AuthError> {
        Ok(blacklisted_token::insert_ignore(&self.db, token, expires_at).await?)
    }

    async fn remove_blacklisted_token(&self, token: &str) -> Result<bool, AuthError> {
        Ok(blacklisted_token::remove(&self.db, token).await?)
    }

    async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        Ok(blacklisted_token::prune_expired(&self.db, now).await?)
    }
}
