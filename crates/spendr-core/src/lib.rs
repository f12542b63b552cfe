//! Core library for the spendr budget client.
//!
//! Holds the client session: persisted bearer tokens, observable auth state,
//! single-flight token refresh, the 401-aware request guard and the logout
//! cascade. The budget resource API sits on top of that guard.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, BudgetApi};
pub use auth::{AuthSnapshot, AuthState, Navigator, Route, Session, Status, TokenStore};
pub use config::Config;
pub use models::{TokenPair, UserProfile};
