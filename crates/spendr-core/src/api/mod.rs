//! REST API client module for the spendr backend.
//!
//! This module provides the `ApiClient` session guard for authenticated
//! calls, the `Endpoint` it sends them through, and the `BudgetApi`
//! resource wrappers built on top of it.
//!
//! The API uses JWT bearer access tokens, renewed through a refresh token
//! when the server answers 401.

pub mod budget;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod request;

pub use budget::BudgetApi;
pub use client::ApiClient;
pub use endpoint::Endpoint;
pub use error::ApiError;
pub use request::{ApiRequest, ApiResponse};
