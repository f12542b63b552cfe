//! Session guard for authenticated API calls.
//!
//! `ApiClient` attaches the current access token to every request. When the
//! server answers 401 it asks the [`RefreshCoordinator`] for a new token and
//! replays the request once. A second 401 ends the session instead of looping.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::endpoint::Endpoint;
use super::request::{ApiRequest, ApiResponse};
use super::ApiError;
use crate::auth::{
    AuthFailure, LogoutCascade, RefreshCoordinator, RefreshFailure, TokenKind, TokenStore,
};

// ============================================================================
// Constants
// ============================================================================

/// Replays allowed after a successful refresh. A 401 on the replay is final.
const MAX_AUTH_RETRIES: u32 = 1;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client whose calls survive access token expiry.
/// Clone is cheap - everything inside is shared.
#[derive(Clone)]
pub struct ApiClient {
    endpoint: Endpoint,
    tokens: Arc<TokenStore>,
    refresh: Arc<RefreshCoordinator>,
    logout: Arc<LogoutCascade>,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(
        endpoint: Endpoint,
        tokens: Arc<TokenStore>,
        refresh: Arc<RefreshCoordinator>,
        logout: Arc<LogoutCascade>,
    ) -> Self {
        Self {
            endpoint,
            tokens,
            refresh,
            logout,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Override the first rate-limit backoff delay (doubles on each retry).
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run an authenticated request through the 401 -> refresh -> replay protocol.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut token = self.tokens.get(TokenKind::Access);
        let mut auth_retries = 0;

        loop {
            let response = self.send_with_backoff(request, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::check_response(response);
            }

            if auth_retries >= MAX_AUTH_RETRIES {
                warn!(
                    method = %request.method(),
                    path = request.path(),
                    "Access token rejected after refresh, ending session"
                );
                self.logout.logout().await;
                return Err(ApiError::AuthenticationRequired(AuthFailure::DoubleAuthFailure));
            }
            auth_retries += 1;

            // Another request already refreshed while this one was in flight
            let current = self.tokens.get(TokenKind::Access);
            if current.is_some() && current != token {
                debug!(path = request.path(), "Retrying with token refreshed elsewhere");
                token = current;
                continue;
            }

            debug!(
                method = %request.method(),
                path = request.path(),
                "Access token rejected, refreshing"
            );
            match self.refresh.acquire_fresh_token().await {
                Ok(fresh) => token = Some(fresh),
                Err(RefreshFailure::Superseded) => match self.tokens.get(TokenKind::Access) {
                    // A new login replaced the session mid-refresh; its token is live
                    Some(current) if Some(&current) != token.as_ref() => {
                        debug!(path = request.path(), "Session replaced during refresh, retrying");
                        token = Some(current);
                    }
                    _ => {
                        return Err(ApiError::AuthenticationRequired(
                            RefreshFailure::Superseded.into(),
                        ))
                    }
                },
                Err(failure) => return Err(ApiError::AuthenticationRequired(failure.into())),
            }
        }
    }

    /// Send without credentials and without the refresh protocol (login, registration).
    pub async fn execute_public(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.send_with_backoff(request, None).await?;
        Self::check_response(response)
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.json()
    }

    /// For calls whose success carries no body (e.g. DELETE).
    pub async fn execute_empty(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_json(&ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.execute_json(&ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.execute_json(&ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute_empty(&ApiRequest::delete(path)).await
    }

    /// Send, backing off and retrying while the server answers 429.
    async fn send_with_backoff(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self.endpoint.send(request, bearer).await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(
                path = request.path(),
                retry = retries,
                backoff_ms = backoff.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    /// Check if response is successful, returning an error with the server's message if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status(), response.text()))
        }
    }
}
