//! Auth module: domain types, repository seam, and the managers behind each flow.
//!
//! [`AuthService`] composes the verification, session and password reset managers and is
//! what the HTTP layer talks to.

pub mod domain;
pub mod errors;
pub mod password;
pub mod repo;
pub mod repository;
pub mod reset;
pub mod service;
pub mod session;
pub mod tokens;
pub mod validation;
pub mod verification;

pub use service::{AuthConfig, AuthService};
