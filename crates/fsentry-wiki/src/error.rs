use std::fmt;

use fsentry_http::TransportError;

/// Failure of one action against the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response arrived (already retried by the transport).
    Transport(TransportError),
    /// The server answered with status >= 400. Never retried.
    Http { status: u16, body: String },
    /// The API answered with its `error` envelope.
    Api { code: String, info: String },
    /// The body was not JSON.
    Decode(String),
    /// JSON arrived but not in the shape the action expects.
    UnexpectedResponse(String),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Transport(TransportError::Cancelled))
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::Transport(e)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(e) => write!(f, "{e}"),
            ApiError::Http { status, body } => write!(f, "http error status={status}: {body}"),
            ApiError::Api { code, info } => write!(f, "api error code={code}: {info}"),
            ApiError::Decode(msg) => write!(f, "decode error: {msg}"),
            ApiError::UnexpectedResponse(msg) => write!(f, "unexpected response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(e) => Some(e),
            _ => None,
        }
    }
}
