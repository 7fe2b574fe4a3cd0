//! Error types for chat streaming

use thiserror::Error;

/// Placeholder used when an error response body cannot be read or is empty
pub const NO_BODY: &str = "<no-body>";

/// Malformed request descriptor, raised before any network I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("messages is required and must be non-empty")]
    EmptyMessages,
    #[error("api key is required")]
    MissingApiKey,
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("invalid {name} header value: {reason}")]
    InvalidHeader { name: &'static str, reason: String },
}

/// Terminal failure of a chat stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-success status, or a success status without a body
    #[error("chat stream error ({status}): {body}")]
    Http { status: u16, body: String },

    /// Network-level failure before or during the body
    #[error("transport error: {0}")]
    Transport(String),

    /// The stream was cancelled by its handle or an external signal
    #[error("stream cancelled")]
    Cancelled,

    /// The stream task itself failed
    #[error("stream task failed: {0}")]
    Internal(String),
}

impl StreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            StreamError::Transport(format!("connection failed: {}", err))
        } else if err.is_timeout() {
            StreamError::Transport(format!("timed out: {}", err))
        } else {
            StreamError::Transport(err.to_string())
        }
    }
}
