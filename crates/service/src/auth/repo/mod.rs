//! Storage-backed implementations of [`AuthRepository`](super::repository::AuthRepository).

pub mod seaorm;
