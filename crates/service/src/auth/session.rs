use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::domain::{AuthSession, AuthenticatedUser, UserProfile};
use super::errors::AuthError;
use super::password::verify_password;
use super::repository::AuthRepository;
use super::service::AuthConfig;
use super::tokens::{decode_claims, sign, timestamp_to_utc, AccessClaims};
use crate::clock::Clock;

/// Login, bearer authentication and logout.
pub struct SessionManager<R: AuthRepository + ?Sized> {
    repo: Arc<R>,
    cfg: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R: AuthRepository + ?Sized> SessionManager<R> {
    pub fn new(repo: Arc<R>, cfg: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, cfg, clock }
    }

    /// Check credentials of a verified user and issue an access token.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self.repo.find_user_by_email(email).await?.ok_or(AuthError::InvalidCredentials)?;
        if !user.verified {
            return Err(AuthError::NotVerified);
        }
        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        let expires_at = now + self.cfg.access_token_ttl;
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let access_token = sign(&claims, &self.cfg.jwt_secret)?;
        if self.repo.remove_blacklisted_token(&access_token).await? {
            debug!(user_id = %user.id, "stale blacklist entry removed for new token");
        }

        info!(user_id = %user.id, "user_logged_in");
        Ok(AuthSession { user: UserProfile::from(&user), access_token, expires_at })
    }

    /// Resolve a bearer token: valid signature, not expired, not revoked.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims: AccessClaims = decode_claims(token, &self.cfg.jwt_secret).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            AuthError::Unauthorized
        })?;
        let now = self.clock.now();
        if claims.exp <= now.timestamp() {
            return Err(AuthError::Unauthorized);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)?;
        let expires_at = timestamp_to_utc(claims.exp).ok_or(AuthError::Unauthorized)?;
        if self.repo.is_token_blacklisted(token).await? {
            return Err(AuthError::Unauthorized);
        }
        Ok(AuthenticatedUser { user_id, email: claims.email, token: token.to_string(), expires_at })
    }

    /// Revoke the caller's token. Revoking twice is a no-op; returns whether this call revoked it.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn logout(&self, session: &AuthenticatedUser) -> Result<bool, AuthError> {
        let inserted = self.repo.blacklist_token(&session.token, Some(session.expires_at)).await?;
        if inserted {
            info!(user_id = %session.user_id, "token_blacklisted");
        } else {
            debug!(user_id = %session.user_id, "token already blacklisted");
        }
        match self.repo.prune_blacklist(self.clock.now()).await {
            Ok(0) => {}
            Ok(n) => debug!(pruned = n, "expired blacklist entries removed"),
            Err(e) => warn!(error = %e, "blacklist pruning failed"),
        }
        Ok(inserted)
    }

    pub async fn current_user(&self, session: &AuthenticatedUser) -> Result<UserProfile, AuthError> {
        let user = self.repo.find_user_by_id(session.user_id).await?.ok_or(AuthError::NotFound)?;
        Ok(UserProfile::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::domain::{NewUserRecord, ResendGuard, UserRecord};
    use crate::auth::password::hash_password;
    use crate::auth::repository::mock::MockAuthRepository;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration, Utc};

    const PASSWORD: &str = "S3cure!pass";

    async fn setup(verified: bool) -> (Arc<MockAuthRepository>, Arc<ManualClock>, SessionManager<MockAuthRepository>) {
        let repo = Arc::new(MockAuthRepository::default());
        let clock = Arc::new(ManualClock::default());
        let user = repo
            .create_user(NewUserRecord {
                username: "carol".into(),
                name: "Carol".into(),
                email: "carol@example.com".into(),
                password_hash: hash_password(PASSWORD).unwrap(),
            })
            .await
            .unwrap();
        if verified {
            let now = clock.now();
            repo.store_verification_code(user.id, "123456", now).await.unwrap();
            assert!(repo.complete_verification(user.id, "123456", now, now).await.unwrap());
        }
        let manager = SessionManager::new(repo.clone(), Arc::new(AuthConfig::for_tests()), clock.clone());
        (repo, clock, manager)
    }

    #[tokio::test]
    async fn unverified_user_cannot_login() {
        let (_, _, sessions) = setup(false).await;
        let res = sessions.login("carol@example.com", PASSWORD).await;
        assert!(matches!(res, Err(AuthError::NotVerified)));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let (_, _, sessions) = setup(true).await;
        let unknown = sessions.login("nobody@example.com", PASSWORD).await.unwrap_err();
        let wrong = sessions.login("carol@example.com", "Wr0ng!pass").await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn token_lives_thirty_minutes() {
        let (_, clock, sessions) = setup(true).await;
        let session = sessions.login("carol@example.com", PASSWORD).await.unwrap();
        assert_eq!(session.expires_at - clock.now(), Duration::minutes(30));

        clock.advance(Duration::minutes(29));
        assert!(sessions.authenticate(&session.access_token).await.is_ok());
        clock.advance(Duration::minutes(1));
        let res = sessions.authenticate(&session.access_token).await;
        assert!(matches!(res, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn logout_revokes_token_idempotently() {
        let (repo, _, sessions) = setup(true).await;
        let session = sessions.login("carol@example.com", PASSWORD).await.unwrap();
        let auth = sessions.authenticate(&session.access_token).await.unwrap();

        assert!(sessions.logout(&auth).await.unwrap());
        let res = sessions.authenticate(&session.access_token).await;
        assert!(matches!(res, Err(AuthError::Unauthorized)));

        assert!(!sessions.logout(&auth).await.unwrap());
        assert_eq!(repo.blacklist_len(), 1);
    }

    #[tokio::test]
    async fn logout_prunes_expired_entries() {
        let (repo, clock, sessions) = setup(true).await;
        repo.blacklist_token("stale", Some(Utc::now() - Duration::hours(1))).await.unwrap();
        repo.blacklist_token("no-expiry", None).await.unwrap();

        let session = sessions.login("carol@example.com", PASSWORD).await.unwrap();
        let auth = sessions.authenticate(&session.access_token).await.unwrap();
        clock.advance(Duration::seconds(1));
        sessions.logout(&auth).await.unwrap();

        assert!(!repo.is_token_blacklisted("stale").await.unwrap());
        assert!(repo.is_token_blacklisted("no-expiry").await.unwrap());
        assert!(repo.is_token_blacklisted(&session.access_token).await.unwrap());
    }

    /// Mock wrapper that plants a leftover blacklist row for whatever token login issues.
    struct StaleBlacklistRepo {
        inner: MockAuthRepository,
        removed: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl AuthRepository for StaleBlacklistRepo {
        async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
            self.inner.find_user_by_email(email).await
        }
        async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
            self.inner.find_user_by_username(username).await
        }
        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
            self.inner.find_user_by_id(id).await
        }
        async fn create_user(&self, input: NewUserRecord) -> Result<UserRecord, AuthError> {
            self.inner.create_user(input).await
        }
        async fn store_verification_code(&self, user_id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<(), AuthError> {
            self.inner.store_verification_code(user_id, code, sent_at).await
        }
        async fn complete_verification(
            &self,
            user_id: Uuid,
            code: &str,
            not_before: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> Result<bool, AuthError> {
            self.inner.complete_verification(user_id, code, not_before, now).await
        }
        async fn record_resend(&self, user_id: Uuid, code: &str, now: DateTime<Utc>, guard: ResendGuard) -> Result<bool, AuthError> {
            self.inner.record_resend(user_id, code, now, guard).await
        }
        async fn update_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<(), AuthError> {
            self.inner.update_password_hash(user_id, password_hash).await
        }
        async fn is_token_blacklisted(&self, token: &str) -> Result<bool, AuthError> {
            self.inner.is_token_blacklisted(token).await
        }
        async fn blacklist_token(&self, token: &str, expires_at: Option<DateTime<Utc>>) -> Result<bool, AuthError> {
            self.inner.blacklist_token(token, expires_at).await
        }
        async fn remove_blacklisted_token(&self, token: &str) -> Result<bool, AuthError> {
            self.inner.blacklist_token(token, None).await?;
            self.removed.lock().unwrap().push(token.to_string());
            self.inner.remove_blacklisted_token(token).await
        }
        async fn prune_blacklist(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
            self.inner.prune_blacklist(now).await
        }
    }

    #[tokio::test]
    async fn login_clears_stale_blacklist_entry_for_new_token() {
        let repo = Arc::new(StaleBlacklistRepo { inner: MockAuthRepository::default(), removed: Default::default() });
        let clock = Arc::new(ManualClock::default());
        let user = repo
            .create_user(NewUserRecord {
                username: "carol".into(),
                name: "Carol".into(),
                email: "carol@example.com".into(),
                password_hash: hash_password(PASSWORD).unwrap(),
            })
            .await
            .unwrap();
        let now = clock.now();
        repo.store_verification_code(user.id, "123456", now).await.unwrap();
        assert!(repo.complete_verification(user.id, "123456", now, now).await.unwrap());
        let sessions = SessionManager::new(repo.clone(), Arc::new(AuthConfig::for_tests()), clock);

        let session = sessions.login("carol@example.com", PASSWORD).await.unwrap();
        assert_eq!(*repo.removed.lock().unwrap(), vec![session.access_token.clone()]);
        assert_eq!(repo.inner.blacklist_len(), 0);
        assert!(sessions.authenticate(&session.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn garbage_tokens_are_unauthorized() {
        let (_, _, sessions) = setup(true).await;
        for token in ["", "abc", "a.b.c"] {
            assert!(matches!(sessions.authenticate(token).await, Err(AuthError::Unauthorized)));
        }
    }

    #[tokio::test]
    async fn current_user_reads_profile() {
        let (_, _, sessions) = setup(true).await;
        let session = sessions.login("carol@example.com", PASSWORD).await.unwrap();
        let auth = sessions.authenticate(&session.access_token).await.unwrap();
        let profile = sessions.current_user(&auth).await.unwrap();
        assert_eq!(profile.username, "carol");
        assert!(profile.verified);
    }
}
