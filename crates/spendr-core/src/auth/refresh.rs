//! Single-flight access token refresh.
//!
//! However many requests see a 401 at the same time, at most one refresh call
//! is on the wire. The first caller starts a refresh episode; everyone who
//! arrives while it is outstanding awaits the same shared outcome.
//!
//! The episode runs as its own task, so it settles (and updates the token
//! store and auth state) even if every caller that awaited it goes away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::RefreshFailure;
use super::lock;
use super::logout::LogoutCascade;
use super::state::AuthState;
use super::token_store::{TokenKind, TokenStore};
use crate::api::{ApiRequest, Endpoint};

/// Token refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "auth/token/refresh/";

type RefreshOutcome = Result<String, RefreshFailure>;
type Episode = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: Option<String>,
    /// Present when the server rotates refresh tokens
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

struct RefreshedTokens {
    access: String,
    refresh: Option<String>,
}

enum Attach {
    Join(Episode),
    NoRefreshToken,
}

/// Everything an episode task needs, detached from the coordinator's lifetime.
#[derive(Clone)]
struct EpisodeContext {
    endpoint: Endpoint,
    tokens: Arc<TokenStore>,
    state: Arc<AuthState>,
    logout: Arc<LogoutCascade>,
    slot: Arc<Mutex<Option<(u64, Episode)>>>,
}

pub struct RefreshCoordinator {
    ctx: EpisodeContext,
    next_episode: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        endpoint: Endpoint,
        tokens: Arc<TokenStore>,
        state: Arc<AuthState>,
        logout: Arc<LogoutCascade>,
    ) -> Self {
        Self {
            ctx: EpisodeContext {
                endpoint,
                tokens,
                state,
                logout,
                slot: Arc::new(Mutex::new(None)),
            },
            next_episode: AtomicU64::new(1),
        }
    }

    /// Whether a refresh episode is currently outstanding
    pub fn is_refreshing(&self) -> bool {
        lock(&self.ctx.slot).is_some()
    }

    /// Obtain a new access token, joining the outstanding refresh if there is one.
    ///
    /// On failure the session has already been logged out.
    pub async fn acquire_fresh_token(&self) -> Result<String, RefreshFailure> {
        let attach = {
            let mut slot = lock(&self.ctx.slot);
            match slot.as_ref() {
                Some((id, episode)) => {
                    debug!(episode = id, "Joining in-flight token refresh");
                    Attach::Join(episode.clone())
                }
                None => match self.ctx.tokens.get(TokenKind::Refresh) {
                    Some(refresh_token) => {
                        let id = self.next_episode.fetch_add(1, Ordering::Relaxed);
                        let episode = self.start_episode(id, refresh_token);
                        *slot = Some((id, episode.clone()));
                        Attach::Join(episode)
                    }
                    None => Attach::NoRefreshToken,
                },
            }
        };

        match attach {
            Attach::Join(episode) => episode.await,
            Attach::NoRefreshToken => {
                warn!("No refresh token stored, ending session");
                self.ctx.logout.logout().await;
                Err(RefreshFailure::NoRefreshToken)
            }
        }
    }

    fn start_episode(&self, id: u64, refresh_token: String) -> Episode {
        let task = tokio::spawn(run_episode(self.ctx.clone(), id, refresh_token));
        async move {
            task.await.unwrap_or_else(|e| {
                error!(episode = id, error = %e, "Token refresh task failed");
                Err(RefreshFailure::Transport(format!("refresh task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

async fn run_episode(ctx: EpisodeContext, id: u64, refresh_token: String) -> RefreshOutcome {
    info!(episode = id, "Refreshing access token");
    ctx.state.begin_refresh();

    let outcome = match request_new_tokens(&ctx.endpoint, &refresh_token).await {
        Ok(fresh) => {
            // A logout or a new login while we were waiting owns the store now
            if ctx.tokens.get(TokenKind::Refresh).as_deref() != Some(refresh_token.as_str()) {
                warn!(episode = id, "Session changed during refresh, discarding new token");
                Err(RefreshFailure::Superseded)
            } else {
                ctx.tokens.set(TokenKind::Access, &fresh.access);
                if let Some(rotated) = fresh.refresh.as_deref() {
                    ctx.tokens.set(TokenKind::Refresh, rotated);
                }
                ctx.state.login(&fresh.access);
                info!(episode = id, rotated = fresh.refresh.is_some(), "Access token refreshed");
                Ok(fresh.access)
            }
        }
        Err(failure) => {
            warn!(episode = id, error = %failure, "Token refresh failed, ending session");
            ctx.state.mark_expired();
            // Teardown completes before the episode is released, so a caller
            // arriving now cannot start a second refresh with the dead token.
            ctx.logout.logout().await;
            Err(failure)
        }
    };

    let mut slot = lock(&ctx.slot);
    if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
        *slot = None;
    }
    outcome
}

async fn request_new_tokens(
    endpoint: &Endpoint,
    refresh_token: &str,
) -> Result<RefreshedTokens, RefreshFailure> {
    let request = ApiRequest::post(REFRESH_PATH)
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

    let response = endpoint
        .send(&request, None)
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(RefreshFailure::Transport("rate limited".to_string()));
    }
    if status.is_client_error() {
        return Err(RefreshFailure::Rejected(status.as_u16()));
    }
    if !status.is_success() {
        return Err(RefreshFailure::Transport(format!("status {}", status)));
    }

    let parsed: RefreshResponse = serde_json::from_str(response.text())
        .map_err(|e| RefreshFailure::MalformedResponse(e.to_string()))?;

    match parsed.access.filter(|a| !a.is_empty()) {
        Some(access) => Ok(RefreshedTokens {
            access,
            refresh: parsed.refresh.filter(|r| !r.is_empty()),
        }),
        None => Err(RefreshFailure::MalformedResponse(
            "no access token in response".to_string(),
        )),
    }
}
