use thiserror::Error;

/// Errors talking to the profile store.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session expired: profile store rejected the token")]
    Unauthorized,

    #[error("Profile '{0}' not found")]
    NotFound(String),

    #[error("Profile store error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Profile store unavailable: {0}")]
    Unavailable(String),
}

impl SyncError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: &str, resource: &str) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound(resource.to_string()),
            _ => Self::Status {
                status,
                message: error_message(body),
            },
        }
    }
}

/// Pull `message` or `error` out of a JSON error body, else use the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "API Error".to_string()
            } else {
                body.to_string()
            }
        })
}
