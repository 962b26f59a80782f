use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration input. Fields are optional so missing ones can be reported together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyEmailInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailInput {
    #[serde(default)]
    pub email: Option<String>,
}

/// Login input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetPasswordInput {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// Stored user, as seen by the auth core.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub verification_sent_at: Option<DateTime<Utc>>,
    pub resend_attempts: i32,
    pub last_resend_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Values for a user row that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Conditions a resend must satisfy at write time.
#[derive(Debug, Clone, Copy)]
pub struct ResendGuard {
    pub max_attempts: i32,
    /// The previous resend must be at or before this instant.
    pub cooldown_cutoff: DateTime<Utc>,
}

/// Public view of a user returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub verified: bool,
}

impl From<&UserRecord> for UserProfile {
    fn from(u: &UserRecord) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            verified: u.verified,
        }
    }
}

/// Login result (session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: UserProfile,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity extracted from a valid, non-revoked bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
