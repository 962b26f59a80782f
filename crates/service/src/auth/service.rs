use std::sync::Arc;

use chrono::Duration;
use configs::AuthSettings;
use tracing::{debug, info, instrument};

use super::domain::{
    AuthSession, AuthenticatedUser, EmailInput, LoginInput, NewUserRecord, RegisterInput, ResetPasswordInput, UserProfile,
    VerifyEmailInput,
};
use super::errors::AuthError;
use super::password::hash_password;
use super::repository::AuthRepository;
use super::reset::PasswordResetManager;
use super::session::SessionManager;
use super::validation::{check_new_password, is_valid_email, require_fields};
use super::verification::{CodeGenerator, RandomCodeGenerator, VerificationManager};
use crate::clock::{Clock, SystemClock};
use crate::mail::{LogMailer, Mailer};

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Signs session tokens
    pub jwt_secret: String,
    /// Signs password reset tokens
    pub secret_key: String,
    pub access_token_ttl: Duration,
    pub verification_code_ttl: Duration,
    pub resend_cooldown: Duration,
    pub max_resend_attempts: i32,
    pub reset_token_ttl: Duration,
    pub reset_url_base: String,
}

impl From<&AuthSettings> for AuthConfig {
    fn from(s: &AuthSettings) -> Self {
        Self {
            jwt_secret: s.jwt_secret.clone(),
            secret_key: s.secret_key.clone(),
            access_token_ttl: Duration::minutes(s.access_token_ttl_minutes),
            verification_code_ttl: Duration::minutes(s.verification_code_ttl_minutes),
            resend_cooldown: Duration::minutes(s.resend_cooldown_minutes),
            max_resend_attempts: s.max_resend_attempts,
            reset_token_ttl: Duration::minutes(s.reset_token_ttl_minutes),
            reset_url_base: s.reset_url_base.clone(),
        }
    }
}

impl AuthConfig {
    /// Default lifetimes with fixed secrets. Tests, benches and doc examples only.
    pub fn for_tests() -> Self {
        Self::from(&AuthSettings {
            jwt_secret: "test-jwt-secret-0123456789".into(),
            secret_key: "test-reset-secret-0123456789".into(),
            ..Default::default()
        })
    }
}

/// Auth business service independent of web framework
pub struct AuthService<R: AuthRepository + ?Sized> {
    repo: Arc<R>,
    verification: VerificationManager<R>,
    sessions: SessionManager<R>,
    resets: PasswordResetManager<R>,
}

impl<R: AuthRepository + ?Sized> AuthService<R> {
    /// Wall clock, random codes, and a mailer that only logs.
    pub fn new(repo: Arc<R>, cfg: AuthConfig) -> Self {
        Self::with_parts(repo, cfg, Arc::new(SystemClock), Arc::new(LogMailer), Arc::new(RandomCodeGenerator))
    }

    pub fn with_parts(
        repo: Arc<R>,
        cfg: AuthConfig,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        let cfg = Arc::new(cfg);
        Self {
            verification: VerificationManager::new(repo.clone(), cfg.clone(), clock.clone(), mailer.clone(), codes),
            sessions: SessionManager::new(repo.clone(), cfg.clone(), clock.clone()),
            resets: PasswordResetManager::new(repo.clone(), cfg, clock, mailer),
            repo,
        }
    }

    pub fn verification(&self) -> &VerificationManager<R> { &self.verification }
    pub fn sessions(&self) -> &SessionManager<R> { &self.sessions }
    pub fn resets(&self) -> &PasswordResetManager<R> { &self.resets }

    /// Register a new, unverified user and send the first verification code.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::MockAuthRepository};
    /// use service::auth::domain::RegisterInput;
    /// use std::sync::Arc;
    /// let repo = Arc::new(MockAuthRepository::default());
    /// let svc = AuthService::new(repo, AuthConfig::for_tests());
    /// let input = RegisterInput {
    ///     username: Some("alice".into()),
    ///     name: None,
    ///     email: Some("alice@example.com".into()),
    ///     password: Some("S3cure!pass".into()),
    ///     confirm_password: Some("S3cure!pass".into()),
    /// };
    /// let user = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(user.email, "alice@example.com");
    /// assert_eq!(user.name, "alice");
    /// assert!(!user.verified);
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email.as_deref().unwrap_or_default()))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserProfile, AuthError> {
        let fields = require_fields(&[
            ("username", &input.username),
            ("email", &input.email),
            ("password", &input.password),
            ("confirm_password", &input.confirm_password),
        ])?;
        let (username, email, password, confirm) = (fields[0].trim(), fields[1].trim(), fields[2], fields[3]);
        if !is_valid_email(email) {
            return Err(AuthError::Validation("Invalid email format".into()));
        }
        check_new_password(password, confirm)?;

        if let Some(existing) = self.repo.find_user_by_username(username).await? {
            debug!("username taken: {}", existing.username);
            return Err(AuthError::Conflict);
        }
        if let Some(existing) = self.repo.find_user_by_email(email).await? {
            debug!("email taken: {}", existing.email);
            return Err(AuthError::Conflict);
        }

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(username)
            .to_string();
        let user = self
            .repo
            .create_user(NewUserRecord {
                username: username.to_string(),
                name,
                email: email.to_string(),
                password_hash: hash_password(password)?,
            })
            .await?;
        self.verification.issue(&user).await?;
        info!(user_id = %user.id, username = %user.username, "user_registered");
        Ok(UserProfile::from(&user))
    }

    pub async fn verify_email(&self, input: VerifyEmailInput) -> Result<UserProfile, AuthError> {
        let fields = require_fields(&[("email", &input.email), ("code", &input.code)])?;
        self.verification.verify(fields[0].trim(), fields[1].trim()).await
    }

    pub async fn resend_verification(&self, input: EmailInput) -> Result<(), AuthError> {
        let fields = require_fields(&[("email", &input.email)])?;
        self.verification.resend_code(fields[0].trim()).await.map(|_| ())
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let fields = require_fields(&[("email", &input.email), ("password", &input.password)])?;
        self.sessions.login(fields[0].trim(), fields[1]).await
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.sessions.authenticate(token).await
    }

    pub async fn logout(&self, session: &AuthenticatedUser) -> Result<bool, AuthError> {
        self.sessions.logout(session).await
    }

    pub async fn current_user(&self, session: &AuthenticatedUser) -> Result<UserProfile, AuthError> {
        self.sessions.current_user(session).await
    }

    /// Returns the minted token; HTTP callers only ever see it by email.
    pub async fn request_password_reset(&self, input: EmailInput) -> Result<String, AuthError> {
        let fields = require_fields(&[("email", &input.email)])?;
        self.resets.request_reset(fields[0].trim()).await
    }

    pub async fn reset_password(&self, input: ResetPasswordInput) -> Result<(), AuthError> {
        let fields = require_fields(&[
            ("token", &input.token),
            ("new_password", &input.new_password),
            ("confirm_password", &input.confirm_password),
        ])?;
        self.resets.reset_password(fields[0].trim(), fields[1], fields[2]).await
    }
}
