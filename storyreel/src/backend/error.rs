/// Failure category of a generation backend call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Credential missing, invalid or lacking permission.
    Auth,
    /// Model or entity not found (usually a credential bound to the wrong project).
    NotFound,
    /// Quota or rate limit exceeded.
    RateLimited,
    /// Network failures and 5xx responses.
    Transient,
    /// The backend answered but the payload broke the contract.
    InvalidResponse,
}

impl BackendErrorKind {
    /// Return `true` when the user has to pick another credential before retrying.
    pub fn requires_credential(self) -> bool {
        matches!(self, Self::Auth | Self::NotFound)
    }

    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            _ => Self::Transient,
        }
    }
}

/// Error returned by [`crate::GenerationBackend`] calls.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("backend error ({kind:?}): {message}")]
pub struct BackendError {
    /// Failure category; drives the retry policy.
    pub kind: BackendErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl BackendError {
    /// Build an error of the given kind.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build a [`BackendErrorKind::Transient`] error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    /// Build a [`BackendErrorKind::InvalidResponse`] error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::InvalidResponse, message)
    }
}
