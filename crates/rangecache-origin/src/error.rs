//! Error types for origin operations
//!
//! Every origin maps its transport failures onto the same small taxonomy so the
//! cache layer can tell an unreachable server from a stale range request or a
//! truncated transfer without knowing which protocol produced it.

use thiserror::Error;

/// Result type alias for origin operations
pub type OriginResult<T> = Result<T, OriginError>;

/// Errors returned by [`Origin`](crate::Origin) implementations
#[derive(Debug, Error)]
pub enum OriginError {
    /// The origin could not be contacted
    ///
    /// Covers DNS failures, refused connections, timeouts and connections
    /// dropped before a response arrived. Retrying may succeed.
    #[error("Origin unreachable: {url}: {reason}")]
    Unreachable {
        /// The URL that could not be reached
        url: String,
        /// Description of the transport failure
        reason: String,
    },

    /// The requested range lies beyond the current size of the resource
    ///
    /// Usually means the resource shrank or changed since it was last
    /// examined. Callers holding cached metadata should re-stat.
    #[error("Range {start}-{end} not satisfiable for {url}")]
    RangeUnsatisfiable {
        /// The URL the range was requested from
        url: String,
        /// Requested start offset (inclusive)
        start: u64,
        /// Requested end offset (exclusive)
        end: u64,
    },

    /// The origin returned fewer bytes than requested
    #[error("Short read from {url}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// The URL being read
        url: String,
        /// Number of bytes requested
        expected: u64,
        /// Number of bytes actually received
        actual: u64,
    },

    /// The resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The server answered with an unexpected HTTP status
    ///
    /// 5xx responses are treated as transient by the retry policy.
    #[error("HTTP request failed with status {status_code} for URL: {url}")]
    HttpStatus {
        /// HTTP status code returned by the server
        status_code: u16,
        /// The URL that generated the error
        url: String,
    },

    /// The server violated the protocol or sent something unparseable
    #[error("Protocol error from {url}: {reason}")]
    Protocol {
        /// The URL being accessed
        url: String,
        /// What was wrong with the response
        reason: String,
    },

    /// The URL scheme has no origin implementation
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Local I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OriginError {
    /// Whether a retry of the same request could succeed
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Unreachable { .. } => true,
            Self::HttpStatus { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Whether this error reports a range beyond the resource end
    pub fn is_range_unsatisfiable(&self) -> bool {
        matches!(self, Self::RangeUnsatisfiable { .. })
    }

    /// Whether this error reports a missing resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn unreachable(url: &str, reason: impl ToString) -> Self {
        Self::Unreachable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(url: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
