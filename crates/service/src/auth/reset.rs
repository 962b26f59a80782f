use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::errors::AuthError;
use super::password::hash_password;
use super::repository::AuthRepository;
use super::service::AuthConfig;
use super::tokens::{decode_claims, sign, PurposeClaims, PASSWORD_RESET_PURPOSE};
use super::validation::check_new_password;
use crate::clock::Clock;
use crate::mail::{send_best_effort, templates, Mailer};

/// Stateless password reset: the signed token carries everything needed to redeem it.
pub struct PasswordResetManager<R: AuthRepository + ?Sized> {
    repo: Arc<R>,
    cfg: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    mailer: Arc<dyn Mailer>,
}

impl<R: AuthRepository + ?Sized> PasswordResetManager<R> {
    pub fn new(repo: Arc<R>, cfg: Arc<AuthConfig>, clock: Arc<dyn Clock>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, cfg, clock, mailer }
    }

    /// Mint a reset token for `email` and mail the link. Returns the token.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn request_reset(&self, email: &str) -> Result<String, AuthError> {
        let user = self.repo.find_user_by_email(email).await?.ok_or(AuthError::NotFound)?;
        let now = self.clock.now();
        let claims = PurposeClaims {
            sub: user.email.clone(),
            purpose: PASSWORD_RESET_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.cfg.reset_token_ttl).timestamp(),
        };
        let token = sign(&claims, &self.cfg.secret_key)?;
        let link = format!("{}?token={}", self.cfg.reset_url_base, token);
        send_best_effort(
            self.mailer.as_ref(),
            templates::password_reset(&user.email, &link, self.cfg.reset_token_ttl.num_minutes()),
        )
        .await;
        info!(user_id = %user.id, "password_reset_requested");
        Ok(token)
    }

    /// Redeem a reset token and store the new password hash.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str, confirm_password: &str) -> Result<(), AuthError> {
        check_new_password(new_password, confirm_password)?;
        let email = self.redeem(token)?;
        let user = self.repo.find_user_by_email(&email).await?.ok_or(AuthError::NotFound)?;
        let hash = hash_password(new_password)?;
        self.repo.update_password_hash(user.id, hash).await?;
        info!(user_id = %user.id, "password_reset");
        Ok(())
    }

    /// Signature, purpose and age checks; yields the email the token was minted for.
    fn redeem(&self, token: &str) -> Result<String, AuthError> {
        let claims: PurposeClaims = decode_claims(token, &self.cfg.secret_key).map_err(|e| {
            debug!(error = %e, "reset token rejected");
            AuthError::InvalidOrExpiredToken
        })?;
        if claims.purpose != PASSWORD_RESET_PURPOSE {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        if self.clock.now().timestamp() - claims.iat > self.cfg.reset_token_ttl.num_seconds() {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::domain::NewUserRecord;
    use crate::auth::password::verify_password;
    use crate::auth::repository::mock::MockAuthRepository;
    use crate::clock::ManualClock;
    use crate::mail::mock::{FailingMailer, RecordingMailer};
    use chrono::Duration;

    const OLD: &str = "Old!pass123";
    const NEW: &str = "N3w!password";

    async fn setup(mailer: Arc<dyn Mailer>) -> (Arc<MockAuthRepository>, Arc<ManualClock>, PasswordResetManager<MockAuthRepository>) {
        let repo = Arc::new(MockAuthRepository::default());
        let clock = Arc::new(ManualClock::default());
        repo.create_user(NewUserRecord {
            username: "dave".into(),
            name: "Dave".into(),
            email: "dave@example.com".into(),
            password_hash: hash_password(OLD).unwrap(),
        })
        .await
        .unwrap();
        let manager = PasswordResetManager::new(repo.clone(), Arc::new(AuthConfig::for_tests()), clock.clone(), mailer);
        (repo, clock, manager)
    }

    async fn stored_hash(repo: &MockAuthRepository) -> String {
        repo.find_user_by_email("dave@example.com").await.unwrap().unwrap().password_hash
    }

    #[tokio::test]
    async fn valid_token_replaces_password() {
        let mailer = Arc::new(RecordingMailer::default());
        let (repo, clock, resets) = setup(mailer.clone()).await;
        let token = resets.request_reset("dave@example.com").await.unwrap();
        let mail = mailer.last_to("dave@example.com").unwrap();
        assert!(mail.body.contains(&format!("?token={token}")));

        clock.advance(Duration::minutes(59));
        resets.reset_password(&token, NEW, NEW).await.unwrap();
        let hash = stored_hash(&repo).await;
        assert!(!verify_password(OLD, &hash).unwrap());
        assert!(verify_password(NEW, &hash).unwrap());
    }

    #[tokio::test]
    async fn token_older_than_an_hour_is_rejected() {
        let (repo, clock, resets) = setup(Arc::new(RecordingMailer::default())).await;
        let before = stored_hash(&repo).await;
        let token = resets.request_reset("dave@example.com").await.unwrap();
        clock.advance(Duration::minutes(60) + Duration::seconds(1));
        let res = resets.reset_password(&token, NEW, NEW).await;
        assert!(matches!(res, Err(AuthError::InvalidOrExpiredToken)));
        assert_eq!(stored_hash(&repo).await, before);
    }

    #[tokio::test]
    async fn foreign_purpose_and_forged_tokens_are_rejected() {
        let (_, clock, resets) = setup(Arc::new(RecordingMailer::default())).await;
        let cfg = AuthConfig::for_tests();
        let now = clock.now().timestamp();

        let other_purpose = PurposeClaims { sub: "dave@example.com".into(), purpose: "email-change".into(), iat: now, exp: now + 60 };
        let token = sign(&other_purpose, &cfg.secret_key).unwrap();
        assert!(matches!(resets.reset_password(&token, NEW, NEW).await, Err(AuthError::InvalidOrExpiredToken)));

        let right_purpose = PurposeClaims { sub: "dave@example.com".into(), purpose: PASSWORD_RESET_PURPOSE.into(), iat: now, exp: now + 60 };
        let forged = sign(&right_purpose, "attacker-secret-0123456789").unwrap();
        assert!(matches!(resets.reset_password(&forged, NEW, NEW).await, Err(AuthError::InvalidOrExpiredToken)));

        // Signed with the session key instead of the reset key
        let session_keyed = sign(&right_purpose, &cfg.jwt_secret).unwrap();
        assert!(matches!(resets.reset_password(&session_keyed, NEW, NEW).await, Err(AuthError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn weak_or_mismatched_password_is_a_validation_error() {
        let (_, _, resets) = setup(Arc::new(RecordingMailer::default())).await;
        let token = resets.request_reset("dave@example.com").await.unwrap();
        assert!(matches!(resets.reset_password(&token, "weak", "weak").await, Err(AuthError::Validation(_))));
        assert!(matches!(resets.reset_password(&token, NEW, "N3w!passwore").await, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (_, _, resets) = setup(Arc::new(RecordingMailer::default())).await;
        assert!(matches!(resets.request_reset("nobody@example.com").await, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_request() {
        let (_, _, resets) = setup(Arc::new(FailingMailer)).await;
        assert!(resets.request_reset("dave@example.com").await.is_ok());
    }
}
