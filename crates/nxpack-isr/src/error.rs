use std::time::Duration;

use thiserror::Error;

/// Path resolution failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{path} is not an incrementally regenerated route")]
    NotRevalidatable { path: String },
}

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of one revalidation request
#[derive(Debug, Error)]
pub enum RevalidateError {
    #[error(transparent)]
    NotRevalidatable(#[from] ResolveError),

    #[error("invalidation request failed: {0}")]
    Transport(#[source] TransportError),

    #[error("invalidation request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalidation rejected ({code}): {message}")]
    Rejected { code: u16, message: String },
}

impl RevalidateError {
    pub fn transport(error: impl Into<TransportError>) -> Self {
        RevalidateError::Transport(error.into())
    }
}
