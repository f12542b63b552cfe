use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::navigator::{Navigator, Route};
use super::state::AuthState;
use super::token_store::{TokenKind, TokenStore};
use crate::api::{ApiRequest, Endpoint};

/// Remote logout endpoint, relative to the API base URL
pub const LOGOUT_PATH: &str = "auth/logout/";

/// Upper bound on the best-effort remote call; local teardown must not wait on a dead server.
const REMOTE_LOGOUT_TIMEOUT_SECS: u64 = 5;

#[derive(Serialize)]
struct LogoutBody<'a> {
    refresh: &'a str,
}

/// Tears the session down: remote invalidation, token removal, state reset, redirect.
///
/// Idempotent. Calling it with no session held only resets state and redirects.
pub struct LogoutCascade {
    endpoint: Endpoint,
    tokens: Arc<TokenStore>,
    state: Arc<AuthState>,
    navigator: Arc<dyn Navigator>,
}

impl LogoutCascade {
    pub fn new(
        endpoint: Endpoint,
        tokens: Arc<TokenStore>,
        state: Arc<AuthState>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            endpoint,
            tokens,
            state,
            navigator,
        }
    }

    pub async fn logout(&self) {
        match self.tokens.get(TokenKind::Access) {
            Some(access) => {
                let refresh = self.tokens.get(TokenKind::Refresh);
                self.invalidate_remote(&access, refresh.as_deref()).await;
            }
            None => debug!("No access token held, skipping remote logout"),
        }

        self.tokens.clear();
        self.state.logout();
        self.navigator.navigate(Route::Login);
        info!("Logged out");
    }

    /// Failures are logged and swallowed.
    async fn invalidate_remote(&self, access: &str, refresh: Option<&str>) {
        let mut request = ApiRequest::post(LOGOUT_PATH);
        if let Some(refresh) = refresh {
            match request.clone().json(&LogoutBody { refresh }) {
                Ok(with_body) => request = with_body,
                Err(e) => warn!(error = %e, "Failed to build logout body"),
            }
        }

        let call = self.endpoint.send(&request, Some(access));
        match tokio::time::timeout(Duration::from_secs(REMOTE_LOGOUT_TIMEOUT_SECS), call).await {
            Ok(Ok(response)) if response.status().is_success() => {
                debug!("Remote session invalidated");
            }
            Ok(Ok(response)) => {
                warn!(status = %response.status(), "Remote logout rejected, continuing");
            }
            Ok(Err(e)) => warn!(error = %e, "Remote logout failed, continuing"),
            Err(_) => warn!("Remote logout timed out, continuing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::state::Status;
    use crate::test_support::{mock_endpoint, RecordingNavigator};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cascade(
        server: &MockServer,
    ) -> (LogoutCascade, Arc<TokenStore>, Arc<AuthState>, Arc<RecordingNavigator>) {
        let tokens = Arc::new(TokenStore::in_memory());
        let state = Arc::new(AuthState::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let cascade = LogoutCascade::new(
            mock_endpoint(server),
            Arc::clone(&tokens),
            Arc::clone(&state),
            navigator.clone(),
        );
        (cascade, tokens, state, navigator)
    }

    #[tokio::test]
    async fn test_logout_invalidates_remotely_then_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout/"))
            .and(header("Authorization", "Bearer A1"))
            .and(body_json(serde_json::json!({"refresh": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"detail": "Successfully logged out."})))
            .expect(1)
            .mount(&server)
            .await;

        let (cascade, tokens, state, navigator) = cascade(&server);
        tokens.set(TokenKind::Access, "A1");
        tokens.set(TokenKind::Refresh, "R1");
        state.login("A1");

        cascade.logout().await;

        assert_eq!(tokens.get(TokenKind::Access), None);
        assert_eq!(tokens.get(TokenKind::Refresh), None);
        assert_eq!(state.status(), Status::Anonymous);
        assert_eq!(navigator.routes(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn test_remote_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (cascade, tokens, state, _) = cascade(&server);
        tokens.set(TokenKind::Access, "A1");
        state.login("A1");

        cascade.logout().await;

        assert_eq!(tokens.get(TokenKind::Access), None);
        assert_eq!(state.status(), Status::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_twice_is_harmless() {
        let server = MockServer::start().await;
        // Only the first logout holds a token worth invalidating
        Mock::given(method("POST"))
            .and(path("/api/auth/logout/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (cascade, tokens, state, navigator) = cascade(&server);
        tokens.set(TokenKind::Access, "A1");
        tokens.set(TokenKind::Refresh, "R1");
        state.login("A1");

        cascade.logout().await;
        assert!(tokens.pair().is_none());
        assert_eq!(state.status(), Status::Anonymous);

        cascade.logout().await;
        assert!(tokens.pair().is_none());
        assert_eq!(state.status(), Status::Anonymous);
        assert_eq!(navigator.routes(), vec![Route::Login, Route::Login]);
    }
}
