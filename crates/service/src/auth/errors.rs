use thiserror::Error;

/// Business errors for auth workflows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("User already exists")]
    Conflict,
    #[error("User not found")]
    NotFound,
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("Verification code has expired")]
    Expired,
    #[error("Invalid verification code")]
    CodeMismatch,
    #[error("Maximum number of resend attempts reached")]
    ResendLimitExceeded,
    #[error("Please wait before requesting another verification code")]
    CooldownActive,
    /// Unknown email and wrong password share this variant so callers cannot enumerate accounts.
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Email address has not been verified")]
    NotVerified,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("Missing, invalid or revoked access token")]
    Unauthorized,
    #[error("hashing error: {0}")]
    HashError(String),
    #[error("token error: {0}")]
    TokenError(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::Conflict => 1002,
            AuthError::NotFound => 1003,
            AuthError::InvalidCredentials => 1004,
            AuthError::NotVerified => 1005,
            AuthError::AlreadyVerified => 1010,
            AuthError::Expired => 1011,
            AuthError::CodeMismatch => 1012,
            AuthError::ResendLimitExceeded => 1013,
            AuthError::CooldownActive => 1014,
            AuthError::InvalidOrExpiredToken => 1020,
            AuthError::Unauthorized => 1021,
            AuthError::HashError(_) => 1101,
            AuthError::TokenError(_) => 1102,
            AuthError::Repository(_) => 1200,
        }
    }

    /// Failures that are not the caller's fault; their detail is not shown to clients.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::HashError(_) | AuthError::TokenError(_) | AuthError::Repository(_))
    }
}

impl From<models::errors::ModelError> for AuthError {
    fn from(e: models::errors::ModelError) -> Self {
        use models::errors::ModelError;
        match e {
            ModelError::Validation(msg) => AuthError::Validation(msg),
            ModelError::Conflict(_) => AuthError::Conflict,
            ModelError::Db(msg) => AuthError::Repository(msg),
        }
    }
}
