use std::sync::{Arc, Mutex};

use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

use super::domain::{ResendGuard, UserProfile, UserRecord};
use super::errors::AuthError;
use super::repository::AuthRepository;
use super::service::AuthConfig;
use crate::clock::Clock;
use crate::mail::{send_best_effort, templates, Mailer};

/// Source of verification codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform six digit code, leading zeros kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
    }
}

/// Hands out the given codes in order, then repeats the last one.
#[derive(Debug)]
pub struct FixedCodeGenerator {
    codes: Mutex<Vec<String>>,
}

impl FixedCodeGenerator {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut codes: Vec<String> = codes.into_iter().map(Into::into).collect();
        codes.reverse();
        Self { codes: Mutex::new(codes) }
    }
}

impl CodeGenerator for FixedCodeGenerator {
    fn generate(&self) -> String {
        let mut codes = self.codes.lock().unwrap_or_else(|p| p.into_inner());
        if codes.len() > 1 {
            codes.pop().unwrap_or_default()
        } else {
            codes.last().cloned().unwrap_or_else(|| "000000".to_string())
        }
    }
}

/// Issues, checks and re-sends email verification codes.
pub struct VerificationManager<R: AuthRepository + ?Sized> {
    repo: Arc<R>,
    cfg: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    mailer: Arc<dyn Mailer>,
    codes: Arc<dyn CodeGenerator>,
}

impl<R: AuthRepository + ?Sized> VerificationManager<R> {
    pub fn new(
        repo: Arc<R>,
        cfg: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self { repo, cfg, clock, mailer, codes }
    }

    /// Store a fresh code for `user` and email it. Resend bookkeeping starts over.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue(&self, user: &UserRecord) -> Result<String, AuthError> {
        let code = self.codes.generate();
        self.repo.store_verification_code(user.id, &code, self.clock.now()).await?;
        let message = templates::verification_code(&user.email, &code, self.cfg.verification_code_ttl.num_minutes());
        send_best_effort(self.mailer.as_ref(), message).await;
        info!(user_id = %user.id, "verification_code_issued");
        Ok(code)
    }

    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn verify(&self, email: &str, code: &str) -> Result<UserProfile, AuthError> {
        let user = self.repo.find_user_by_email(email).await?.ok_or(AuthError::NotFound)?;
        if user.verified {
            return Err(AuthError::AlreadyVerified);
        }
        let now = self.clock.now();
        let ttl = self.cfg.verification_code_ttl;
        let (Some(stored), Some(sent_at)) = (user.verification_code.as_deref(), user.verification_sent_at) else {
            return Err(AuthError::Expired);
        };
        if now - sent_at > ttl {
            return Err(AuthError::Expired);
        }
        if stored != code {
            return Err(AuthError::CodeMismatch);
        }

        if !self.repo.complete_verification(user.id, code, now - ttl, now).await? {
            return Err(self.verify_lost_race(user.id).await);
        }
        info!(user_id = %user.id, "email_verified");
        let mut profile = UserProfile::from(&user);
        profile.verified = true;
        Ok(profile)
    }

    /// Replace the code and email it again, within the attempt cap and cooldown.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resend_code(&self, email: &str) -> Result<String, AuthError> {
        let user = self.repo.find_user_by_email(email).await?.ok_or(AuthError::NotFound)?;
        if user.verified {
            return Err(AuthError::AlreadyVerified);
        }
        if user.resend_attempts >= self.cfg.max_resend_attempts {
            return Err(AuthError::ResendLimitExceeded);
        }
        let now = self.clock.now();
        if user.last_resend_at.is_some_and(|last| last + self.cfg.resend_cooldown > now) {
            return Err(AuthError::CooldownActive);
        }

        let code = self.codes.generate();
        let guard = ResendGuard {
            max_attempts: self.cfg.max_resend_attempts,
            cooldown_cutoff: now - self.cfg.resend_cooldown,
        };
        if !self.repo.record_resend(user.id, &code, now, guard).await? {
            return Err(self.resend_lost_race(user.id).await);
        }

        let message = templates::verification_code(&user.email, &code, self.cfg.verification_code_ttl.num_minutes());
        send_best_effort(self.mailer.as_ref(), message).await;
        info!(user_id = %user.id, attempt = user.resend_attempts + 1, "verification_resent");
        Ok(code)
    }

    // A concurrent request changed the row between our read and the guarded update.
    async fn verify_lost_race(&self, user_id: Uuid) -> AuthError {
        match self.repo.find_user_by_id(user_id).await {
            Ok(Some(u)) if u.verified => AuthError::AlreadyVerified,
            Ok(Some(_)) => AuthError::CodeMismatch,
            Ok(None) => AuthError::NotFound,
            Err(e) => e,
        }
    }

    async fn resend_lost_race(&self, user_id: Uuid) -> AuthError {
        match self.repo.find_user_by_id(user_id).await {
            Ok(Some(u)) if u.verified => AuthError::AlreadyVerified,
            Ok(Some(u)) if u.resend_attempts >= self.cfg.max_resend_attempts => AuthError::ResendLimitExceeded,
            Ok(Some(_)) => AuthError::CooldownActive,
            Ok(None) => AuthError::NotFound,
            Err(e) => e,
        }
    }
}
