//! Fetch error type for retry classification.

use std::fmt;
use thiserror::Error;

/// High-level classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request exceeded the configured timeout.
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Other 5xx status.
    Http5xx(u16),
    /// Response arrived but could not be used (4xx, login page, unparseable row).
    Malformed,
    /// Anything else (invalid URL, task failure).
    Other,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Throttled | ErrorKind::Connection | ErrorKind::Http5xx(_)
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Throttled => write!(f, "throttled"),
            ErrorKind::Connection => write!(f, "connection"),
            ErrorKind::Http5xx(code) => write!(f, "HTTP {}", code),
            ErrorKind::Malformed => write!(f, "malformed response"),
            ErrorKind::Other => write!(f, "error"),
        }
    }
}

/// Error returned by one register fetch. Only `Transient` is retried.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("{kind}: {message}")]
    Transient { kind: ErrorKind, message: String },
    #[error("{kind}: {message}")]
    Permanent { kind: ErrorKind, message: String },
}

impl FetchError {
    /// Build an error whose variant follows from the kind.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if kind.is_transient() {
            FetchError::Transient { kind, message }
        } else {
            FetchError::Permanent { kind, message }
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        FetchError::Permanent {
            kind: ErrorKind::Malformed,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        FetchError::Transient {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transient { kind, .. } | FetchError::Permanent { kind, .. } => *kind,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}
