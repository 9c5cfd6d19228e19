//! Error types for the record access module.

use std::fmt;

use thiserror::Error;

/// Classification of an [`AccessError`].
///
/// The transport layer maps each kind to its protocol-level status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Identity unresolved, owned group missing, or endpoint not permitted.
    Unauthorized,
    /// Malformed body, restricted field, validator rejection or a filter
    /// argument rejected by the store.
    BadRequest,
    /// Requested item key does not exist (or is outside the caller's filter).
    NotFound,
    /// Store or lookup transport errors and other unexpected failures.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::BadRequest => write!(f, "bad request"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Internal => write!(f, "internal error"),
        }
    }
}

/// Errors that can occur when using the record access API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AccessError {
    kind: ErrorKind,
    message: String,
}

impl AccessError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
