//! HS256 token minting and decoding.
//!
//! Expiry is checked against the service [`Clock`](crate::clock::Clock) by the callers, not by
//! `jsonwebtoken`, so that lifetimes behave the same under a manual clock in tests.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::errors::AuthError;

/// Purpose tag bound into password reset tokens.
pub const PASSWORD_RESET_PURPOSE: &str = "password-reset";

/// Claims of a session bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Claims of a single-purpose signed token (password reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurposeClaims {
    /// Email address the token was minted for
    pub sub: String,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::TokenError(e.to_string()))
}

/// Check the signature and shape; time-based checks are left to the caller.
pub fn decode_claims<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    let data = decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

pub fn timestamp_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-0123456789";

    #[test]
    fn access_claims_survive_signing() {
        let claims = AccessClaims { sub: "u1".into(), email: "a@b.co".into(), iat: 10, exp: 20, jti: "j".into() };
        let token = sign(&claims, SECRET).unwrap();
        let back: AccessClaims = decode_claims(&token, SECRET).unwrap();
        assert_eq!(back.sub, "u1");
        assert_eq!(back.exp, 20);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let claims = PurposeClaims { sub: "a@b.co".into(), purpose: PASSWORD_RESET_PURPOSE.into(), iat: 1, exp: 2 };
        let token = sign(&claims, SECRET).unwrap();
        assert!(decode_claims::<PurposeClaims>(&token, "another-secret-0123456789").is_err());
    }

    #[test]
    fn access_token_does_not_parse_as_purpose_token() {
        let claims = AccessClaims { sub: "u1".into(), email: "a@b.co".into(), iat: 10, exp: 20, jti: "j".into() };
        let token = sign(&claims, SECRET).unwrap();
        assert!(decode_claims::<PurposeClaims>(&token, SECRET).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let claims = PurposeClaims { sub: "a@b.co".into(), purpose: PASSWORD_RESET_PURPOSE.into(), iat: 1, exp: 2 };
        let mut token = sign(&claims, SECRET).unwrap();
        token.push('x');
        assert!(decode_claims::<PurposeClaims>(&token, SECRET).is_err());
    }
}
