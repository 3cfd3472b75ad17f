use std::fmt;

/// Failure to obtain any response from the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connect, timeout, or body read failure. Retryable.
    Connect(String),
    /// The request could not be built (bad URL, bad header). Not retryable.
    InvalidRequest(String),
    /// The shared shutdown token fired while waiting.
    Cancelled,
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "transport error: {msg}"),
            TransportError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            TransportError::Cancelled => write!(f, "transport cancelled"),
        }
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connect_failures_are_retryable() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(!TransportError::InvalidRequest("bad url".into()).is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[test]
    fn display() {
        assert_eq!(
            TransportError::Connect("connection refused".into()).to_string(),
            "transport error: connection refused"
        );
        assert_eq!(TransportError::Cancelled.to_string(), "transport cancelled");
    }
}
