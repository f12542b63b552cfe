use thiserror::Error;

use crate::auth::AuthFailure;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication required: {0}")]
    AuthenticationRequired(AuthFailure),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    MalformedResponse(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-401 failure response to an error with a readable message.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ApiError::RateLimited;
        }
        let message = error_message(body)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| Self::truncate_body(trimmed))
            })
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Whether this error ended the session (the caller should show the login view)
    pub fn is_session_ending(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::AuthenticationRequired(_) => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Extract a human-readable message from a structured error payload:
/// `detail`, then `non_field_errors`, then every field joined.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    message_from_value(&value)
}

fn message_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(detail) = map.get("detail").and_then(flatten_messages) {
                return Some(detail);
            }
            if let Some(errors) = map.get("non_field_errors").and_then(flatten_messages) {
                return Some(errors);
            }
            let fields: Vec<String> = map
                .iter()
                .filter_map(|(field, v)| flatten_messages(v).map(|msg| format!("{}: {}", field, msg)))
                .collect();
            (!fields.is_empty()).then(|| fields.join("; "))
        }
        other => flatten_messages(other),
    }
}

fn flatten_messages(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(flatten_messages).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        serde_json::Value::Object(_) => message_from_value(value),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
