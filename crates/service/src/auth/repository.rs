use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{NewUserRecord, ResendGuard, UserRecord};
use super::errors::AuthError;

/// Repository abstraction for auth-related persistence (users and revoked tokens).
///
/// The conditional writes (`complete_verification`, `record_resend`) must be atomic: the
/// guard and the update happen as one step so concurrent requests cannot both pass.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError>;
    /// Fails with `Conflict` when the username or email is taken.
    async fn create_user(&self, input: NewUserRecord) -> Result<UserRecord, AuthError>;

    /// Store a new code, stamp `verification_sent_at`, reset resend counters.
    async fn store_verification_code(&self, user_id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<(), AuthError>;
    /// Verify and clear the code if it matches and was sent at or after `not_before`.
    async fn complete_verification(
        &self,
        user_id: Uuid,
        code: &str,
        not_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;
    /// Replace the code and count the resend if `guard` still holds.
    async fn record_resend(&self, user_id: Uuid, code: &str, now: DateTime<Utc>, guard: ResendGuard) -> Result<bool, AuthError>;
    async fn update_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<(), AuthError>;

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AuthError>;
    /// Insert-or-ignore; `true` if the token was not blacklisted before.
    async fn blacklist_token(&self, token: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool, AuthError>;
    async fn remove_blacklisted_token(&self, token: &str) -> Result<bool, AuthError>;
    /// Drop entries whose token expired before `now`.
    async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        users: HashMap<Uuid, UserRecord>,
        blacklist: HashMap<String, Option<DateTime<Utc>>>,
    }

    /// One lock over all tables, so each conditional write is atomic.
    #[derive(Default)]
    pub struct MockAuthRepository {
        state: Mutex<State>,
    }

    impl MockAuthRepository {
        pub fn blacklist_len(&self) -> usize {
            self.state.lock().unwrap().blacklist.len()
        }
    }

    #[async_trait]
    impl AuthRepository for MockAuthRepository {
        async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
            let state = self.state.lock().unwrap();
            Ok(state.users.values().find(|u| u.email == email).cloned())
        }

        async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
            let state = self.state.lock().unwrap();
            Ok(state.users.values().find(|u| u.username == username).cloned())
        }

        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
            let state = self.state.lock().unwrap();
            Ok(state.users.get(&id).cloned())
        }

        async fn create_user(&self, input: NewUserRecord) -> Result<UserRecord, AuthError> {
            let mut state = self.state.lock().unwrap();
            if state.users.values().any(|u| u.email == input.email || u.username == input.username) {
                return Err(AuthError::Conflict);
            }
            let user = UserRecord {
                id: Uuid::new_v4(),
                username: input.username,
                name: input.name,
                email: input.email,
                password_hash: input.password_hash,
                verified: false,
                verification_code: None,
                verification_sent_at: None,
                resend_attempts: 0,
                last_resend_at: None,
                created_at: Utc::now(),
            };
            state.users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn store_verification_code(&self, user_id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<(), AuthError> {
            let mut state = self.state.lock().unwrap();
            let user = state.users.get_mut(&user_id).ok_or(AuthError::NotFound)?;
            user.verification_code = Some(code.to_string());
            user.verification_sent_at = Some(sent_at);
            user.resend_attempts = 0;
            user.last_resend_at = None;
            Ok(())
        }

        async fn complete_verification(
            &self,
            user_id: Uuid,
            code: &str,
            not_before: DateTime<Utc>,
            _now: DateTime<Utc>,
        ) -> Result<bool, AuthError> {
            let mut state = self.state.lock().unwrap();
            let Some(user) = state.users.get_mut(&user_id) else { return Ok(false) };
            let fresh = user.verification_sent_at.is_some_and(|t| t >= not_before);
            if user.verified || user.verification_code.as_deref() != Some(code) || !fresh {
                return Ok(false);
            }
            user.verified = true;
            user.verification_code = None;
            user.verification_sent_at = None;
            user.resend_attempts = 0;
            user.last_resend_at = None;
            Ok(true)
        }

        async fn record_resend(&self, user_id: Uuid, code: &str, now: DateTime<Utc>, guard: ResendGuard) -> Result<bool, AuthError> {
            let mut state = self.state.lock().unwrap();
            let Some(user) = state.users.get_mut(&user_id) else { return Ok(false) };
            let cooled = user.last_resend_at.map_or(true, |t| t <= guard.cooldown_cutoff);
            if user.verified || user.resend_attempts >= guard.max_attempts || !cooled {
                return Ok(false);
            }
            user.verification_code = Some(code.to_string());
            user.verification_sent_at = Some(now);
            user.last_resend_at = Some(now);
            user.resend_attempts += 1;
            Ok(true)
        }

        async fn update_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<(), AuthError> {
            let mut state = self.state.lock().unwrap();
            let user = state.users.get_mut(&user_id).ok_or(AuthError::NotFound)?;
            user.password_hash = password_hash;
            Ok(())
        }

        async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AuthError> {
            Ok(self.state.lock().unwrap().blacklist.contains_key(token))
        }

        async fn blacklist_token(&self, token: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool, AuthError> {
            let mut state = self.state.lock().unwrap();
            if state.blacklist.contains_key(token) {
                return Ok(false);
            }
            state.blacklist.insert(token.to_string(), expires_at);
            Ok(true)
        }

        async fn remove_blacklisted_token(&self, token: &str) -> Result<bool, AuthError> {
            Ok(self.state.lock().unwrap().blacklist.remove(token).is_some())
        }

        async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
            let mut state = self.state.lock().unwrap();
            let before = state.blacklist.len();
            state.blacklist.retain(|_, exp| exp.map_or(true, |e| e >= now));
            Ok((before - state.blacklist.len()) as u64)
        }
    }
}
