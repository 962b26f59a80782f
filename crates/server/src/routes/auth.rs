use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use common::types::MessageBody;
use service::auth::domain::{
    AuthenticatedUser, EmailInput, LoginInput, RegisterInput, ResetPasswordInput, UserProfile, VerifyEmailInput,
};
use service::auth::errors::AuthError;
use service::auth::repository::AuthRepository;
use service::auth::AuthService;

use crate::errors::ApiError;
use crate::rate_limit::RateLimiter;

/// Shared per-process context, built once at startup.
#[derive(Clone)]
pub struct ServerState {
    pub auth: Arc<AuthService<dyn AuthRepository>>,
    pub limiter: Arc<dyn RateLimiter>,
    /// Rate-limit clients by `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
}

#[derive(Serialize)]
pub struct UserOutput {
    pub message: &'static str,
    pub user: UserProfile,
}

#[derive(Serialize)]
pub struct LoginOutput {
    pub message: &'static str,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

type Body<T> = Result<Json<T>, JsonRejection>;

pub async fn register(State(state): State<ServerState>, body: Body<RegisterInput>) -> Result<(StatusCode, Json<UserOutput>), ApiError> {
    let Json(input) = body?;
    let user = state.auth.register(input).await?;
    Ok((StatusCode::CREATED, Json(UserOutput { message: "User registered successfully", user })))
}

pub async fn verify_email(State(state): State<ServerState>, body: Body<VerifyEmailInput>) -> Result<Json<UserOutput>, ApiError> {
    let Json(input) = body?;
    let user = state.auth.verify_email(input).await?;
    Ok(Json(UserOutput { message: "Email verified successfully", user }))
}

pub async fn resend_verification(State(state): State<ServerState>, body: Body<EmailInput>) -> Result<Json<MessageBody>, ApiError> {
    let Json(input) = body?;
    state.auth.resend_verification(input).await?;
    Ok(Json(MessageBody::new("Verification code resent")))
}

pub async fn login(State(state): State<ServerState>, body: Body<LoginInput>) -> Result<Json<LoginOutput>, ApiError> {
    let Json(input) = body?;
    let session = state.auth.login(input).await?;
    Ok(Json(LoginOutput {
        message: "Login Success",
        access_token: session.access_token,
        token_type: "Bearer",
        expires_at: session.expires_at,
    }))
}

pub async fn logout(State(state): State<ServerState>, Extension(session): Extension<AuthenticatedUser>) -> Result<Json<MessageBody>, ApiError> {
    state.auth.logout(&session).await?;
    Ok(Json(MessageBody::new("User logged out successfully!")))
}

pub async fn me(State(state): State<ServerState>, Extension(session): Extension<AuthenticatedUser>) -> Result<Json<UserOutput>, ApiError> {
    let user = state.auth.current_user(&session).await?;
    Ok(Json(UserOutput { message: "Current user", user }))
}

pub async fn forgot_password(State(state): State<ServerState>, body: Body<EmailInput>) -> Result<Json<MessageBody>, ApiError> {
    let Json(input) = body?;
    // The token only travels by email
    let _token = state.auth.request_password_reset(input).await?;
    Ok(Json(MessageBody::new("Password reset link sent to your email")))
}

pub async fn reset_password(State(state): State<ServerState>, body: Body<ResetPasswordInput>) -> Result<Json<MessageBody>, ApiError> {
    let Json(input) = body?;
    state.auth.reset_password(input).await?;
    Ok(Json(MessageBody::new("Password has been reset successfully")))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Route layer for protected endpoints: resolves `Authorization: Bearer <token>` into an
/// [`AuthenticatedUser`] request extension. Missing, invalid, expired or revoked tokens get 401.
pub async fn require_bearer_token(State(state): State<ServerState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        warn!(%path, "missing or malformed Authorization header");
        return Err(AuthError::Unauthorized.into());
    };
    let user = state.auth.authenticate(&token).await.map_err(|e| {
        warn!(%path, error = %e, "bearer token rejected");
        ApiError::from(e)
    })?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
        headers.insert(header::AUTHORIZATION, "bearer xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("xyz"));
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
