//! The client session: one explicitly constructed object owning the token
//! store, auth state, refresh coordinator, logout cascade and API client.
//!
//! Nothing here is global; tests build as many sessions as they like.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::logout::LogoutCascade;
use super::navigator::{Navigator, Route};
use super::refresh::RefreshCoordinator;
use super::state::{AuthSnapshot, AuthState, Subscription};
use super::token_store::{TokenKind, TokenStore};
use crate::api::{ApiClient, ApiError, ApiRequest, BudgetApi, Endpoint};
use crate::config::Config;
use crate::models::{TokenPair, UserProfile};

pub const LOGIN_PATH: &str = "auth/login/";
pub const REGISTRATION_PATH: &str = "auth/registration/";
pub const USER_PATH: &str = "auth/user/";

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// Sign-up form as the registration endpoint expects it.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default, alias = "access_token")]
    access: Option<String>,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
}

impl TokenResponse {
    fn into_parts(self) -> Option<(TokenPair, Option<UserProfile>)> {
        match (self.access, self.refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some((TokenPair { access, refresh }, self.user))
            }
            _ => None,
        }
    }
}

pub struct Session {
    tokens: Arc<TokenStore>,
    state: Arc<AuthState>,
    logout: Arc<LogoutCascade>,
    refresh: Arc<RefreshCoordinator>,
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
}

impl Session {
    /// Build a session from configuration: token storage backend and API endpoint.
    pub fn new(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self, ApiError> {
        let endpoint = Endpoint::from_config(config)?;
        let tokens = Arc::new(TokenStore::from_config(config));
        Ok(Self::with_parts(endpoint, tokens, navigator))
    }

    pub fn with_parts(endpoint: Endpoint, tokens: Arc<TokenStore>, navigator: Arc<dyn Navigator>) -> Self {
        let state = Arc::new(AuthState::new());
        let logout = Arc::new(LogoutCascade::new(
            endpoint.clone(),
            Arc::clone(&tokens),
            Arc::clone(&state),
            Arc::clone(&navigator),
        ));
        let refresh = Arc::new(RefreshCoordinator::new(
            endpoint.clone(),
            Arc::clone(&tokens),
            Arc::clone(&state),
            Arc::clone(&logout),
        ));
        let api = ApiClient::new(
            endpoint,
            Arc::clone(&tokens),
            Arc::clone(&refresh),
            Arc::clone(&logout),
        );

        Self {
            tokens,
            state,
            logout,
            refresh,
            api,
            navigator,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn budget(&self) -> BudgetApi {
        BudgetApi::new(self.api.clone())
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn state(&self) -> &Arc<AuthState> {
        &self.state
    }

    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AuthSnapshot) + Send + Sync + 'static,
    {
        self.state.subscribe(observer)
    }

    /// Run once at startup. A stored access token makes the session
    /// optimistically `authenticated` before the profile fetch verifies it;
    /// consumers see `user == None` meanwhile.
    pub async fn initialize(&self) -> Option<UserProfile> {
        self.state.set_loading(true);

        let Some(access) = self.tokens.get(TokenKind::Access) else {
            debug!("No stored session");
            // A refresh token without an access token is not a session
            self.tokens.clear();
            self.state.logout();
            return None;
        };

        info!("Stored session found, verifying");
        self.state.login(&access);
        match self.current_user().await {
            Ok(user) => Some(user),
            Err(e) if e.is_session_ending() => {
                info!(error = %e, "Stored session is no longer valid");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not verify stored session, keeping it");
                None
            }
        }
    }

    /// Exchange credentials for a token pair and start the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<UserProfile>, ApiError> {
        info!(username, "Logging in");
        let request = ApiRequest::post(LOGIN_PATH).json(&Credentials { username, password });
        match self.request_tokens(request).await? {
            Some((pair, user)) => Ok(self.start(pair, user).await),
            None => {
                self.reconcile();
                Err(ApiError::MalformedResponse(
                    "Login response missing access or refresh token".to_string(),
                ))
            }
        }
    }

    /// Create an account. If the server issues tokens straight away the
    /// session starts; otherwise `Ok(None)` and the caller logs in.
    pub async fn register(&self, registration: &Registration) -> Result<Option<UserProfile>, ApiError> {
        info!(username = %registration.username, "Registering");
        let request = ApiRequest::post(REGISTRATION_PATH).json(registration);
        match self.request_tokens(request).await? {
            Some((pair, user)) => Ok(self.start(pair, user).await),
            None => {
                debug!("Registration issued no tokens");
                self.reconcile();
                Ok(None)
            }
        }
    }

    /// Fetch the signed-in user and publish it to the auth state.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let user: UserProfile = self.api.get(USER_PATH).await?;
        self.state.set_user(user.clone());
        Ok(user)
    }

    pub async fn logout(&self) {
        self.logout.logout().await;
    }

    async fn request_tokens(
        &self,
        request: Result<ApiRequest, ApiError>,
    ) -> Result<Option<(TokenPair, Option<UserProfile>)>, ApiError> {
        self.state.begin_authenticating();

        let response = match request {
            Ok(request) => self.api.execute_public(&request).await,
            Err(e) => Err(e),
        };
        let parsed = response.and_then(|r| r.json::<TokenResponse>());

        match parsed {
            Ok(tokens) => Ok(tokens.into_parts()),
            Err(e) => {
                warn!(error = %e, "Authentication request failed");
                self.reconcile();
                Err(e)
            }
        }
    }

    async fn start(&self, pair: TokenPair, user: Option<UserProfile>) -> Option<UserProfile> {
        self.tokens.set_pair(&pair);
        self.state.login(&pair.access);

        let user = match user {
            Some(user) => {
                self.state.set_user(user.clone());
                Some(user)
            }
            None => match self.current_user().await {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Signed in but could not load user profile");
                    None
                }
            },
        };

        if self.state.status().is_authenticated() {
            self.navigator.navigate(Route::Dashboard);
        }
        user
    }

    /// Make the auth state agree with the token store again.
    fn reconcile(&self) {
        match self.tokens.get(TokenKind::Access) {
            Some(access) => self.state.login(&access),
            None => {
                self.tokens.clear();
                self.state.logout();
            }
        }
    }
}
