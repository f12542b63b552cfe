use thiserror::Error;

/// Outcome of a failed refresh episode, shared by every caller that awaited it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("No refresh token stored - session cannot be renewed")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    Transport(String),

    #[error("Refresh token rejected (status {0})")]
    Rejected(u16),

    #[error("Token refresh response missing access token: {0}")]
    MalformedResponse(String),

    #[error("Session ended while the token refresh was in flight")]
    Superseded,
}

/// Why a session ended. Callers only need to know that it did.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error(transparent)]
    Refresh(#[from] RefreshFailure),

    #[error("Access token rejected again after refresh")]
    DoubleAuthFailure,
}
