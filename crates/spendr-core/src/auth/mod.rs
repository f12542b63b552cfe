//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `TokenStore`: durable holder of the access/refresh token pair
//! - `AuthState`: observable session status and user profile
//! - `RefreshCoordinator`: single-flight access token refresh
//! - `LogoutCascade`: remote invalidation, token removal, state reset
//! - `Session`: the explicitly constructed object tying them together

pub mod error;
pub mod logout;
pub mod navigator;
pub mod refresh;
pub mod session;
pub mod state;
pub mod storage;
pub mod token_store;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use error::{AuthFailure, RefreshFailure};
pub use logout::LogoutCascade;
pub use navigator::{Navigator, NoopNavigator, Route};
pub use refresh::RefreshCoordinator;
pub use session::{Registration, Session};
pub use state::{AuthSnapshot, AuthState, Status, Subscription};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage};
pub use token_store::{TokenKind, TokenStore};

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
