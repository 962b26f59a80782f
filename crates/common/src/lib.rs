//! Shared building blocks for the auth backend crates.
//!
//! - `types`: small response bodies shared by handlers and tests.
//! - `utils::logging`: tracing subscriber setup.

pub mod types;
pub mod utils;
