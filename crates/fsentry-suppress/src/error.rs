use std::fmt;

use fsentry_wiki::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressError {
    /// The remote call failed (transport, status, envelope or shape).
    Api(ApiError),
    /// The allow-list could not be re-fetched; the cache is left empty.
    CacheRefresh(ApiError),
    /// The batch worker has shut down and no longer accepts candidates.
    Stopped,
    /// `start` was called more than once.
    AlreadyStarted,
}

impl From<ApiError> for SuppressError {
    fn from(e: ApiError) -> Self {
        SuppressError::Api(e)
    }
}

impl fmt::Display for SuppressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressError::Api(e) => write!(f, "suppression call failed: {e}"),
            SuppressError::CacheRefresh(e) => write!(f, "allow-list refresh failed: {e}"),
            SuppressError::Stopped => write!(f, "batch worker stopped"),
            SuppressError::AlreadyStarted => write!(f, "batch worker already started"),
        }
    }
}

impl std::error::Error for SuppressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SuppressError::Api(e) | SuppressError::CacheRefresh(e) => Some(e),
            _ => None,
        }
    }
}
