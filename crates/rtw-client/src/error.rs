//! Error taxonomy for the RTW client.
//!
//! Network failures are retried inside the transport up to the bounded
//! attempt budget before surfacing; parse failures are swallowed per
//! suffix; registration and pre-flight validation failures return
//! synchronously. Nothing in this crate panics on wire input.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the RTW client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed at the network layer.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Whether the status is worth re-issuing the request for.
        retryable: bool,
    },

    /// Retry budget exhausted without a completed request.
    #[error("no completion after {attempts} attempts")]
    Timeout {
        /// Attempts issued before giving up.
        attempts: u32,
    },

    /// A response suffix could not be parsed as markup.
    #[error("malformed fragment: {message}")]
    MalformedFragment {
        /// Parser diagnostic.
        message: String,
    },

    /// Listener registration named a field that was never declared.
    #[error("no expected sensors with that name: {name:?}")]
    UnknownField {
        /// The undeclared field name.
        name: String,
    },

    /// A one-shot operation requires credentials that were not supplied.
    #[error("no username or password registered")]
    MissingCredentials,

    /// Object-id resolution was requested without a domain or service.
    #[error("no domain or service property in request parameters")]
    MissingDomainOrService,

    /// The request was cancelled by `disconnect()`.
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Whether re-issuing the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Status { retryable, .. } => *retryable,
            Self::Timeout { .. }
            | Self::MalformedFragment { .. }
            | Self::UnknownField { .. }
            | Self::MissingCredentials
            | Self::MissingDomainOrService
            | Self::Cancelled => false,
        }
    }

    /// Error category string for log fields.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Status { .. } => "api",
            Self::Timeout { .. } => "timeout",
            Self::MalformedFragment { .. } => "parse",
            Self::UnknownField { .. } => "registration",
            Self::MissingCredentials | Self::MissingDomainOrService => "validation",
            Self::Cancelled => "cancelled",
        }
    }

    /// Wire-compatible error code, spelled the way the service spells them.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "Network",
            Self::Status { .. } => "Status",
            Self::Timeout { .. } => "Timedout",
            Self::MalformedFragment { .. } => "Malformed",
            Self::UnknownField { .. } => "UnknownField",
            Self::MissingCredentials => "MissingCredentials",
            Self::MissingDomainOrService => "MissingDomainOrService",
            Self::Cancelled => "Cancelled",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
