//! Service layer for the auth backend.
//! - Business rules for registration, verification, sessions and password reset.
//! - Persistence behind `auth::repository::AuthRepository`; SeaORM impl in `auth::repo`.
//! - Outgoing email and time are injected, see `mail` and `clock`.

pub mod auth;
pub mod clock;
pub mod mail;
#[cfg(test)]
pub mod test_support;
