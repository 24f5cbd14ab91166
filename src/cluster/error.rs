//! Error types for cluster API access

use std::fmt;

/// Result type alias for cluster API operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur while talking to a site's cluster APIs
///
/// The distinction matters for scheduling: `Configuration` is the only
/// retryable kind, everything else is accumulated into the pass result.
#[derive(Debug, Clone)]
pub enum ClusterError {
    /// Client construction failed (malformed endpoint, bad credential
    /// header, TLS setup). Callers never see the underlying transport
    /// error type, only this uniform signal.
    Configuration(String),

    /// A single fetch against an already-built client failed (connect or
    /// read timeout, connection refused, non-2xx status, undecodable body).
    Fetch {
        /// What was being fetched, for the accumulated error string
        context: String,
        /// The transport-level detail
        message: String,
    },
}

impl ClusterError {
    /// Wrap a reqwest error from a fetch as a transient failure.
    pub fn fetch(context: impl Into<String>, err: impl fmt::Display) -> Self {
        ClusterError::Fetch {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ClusterError::Configuration(_))
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::Configuration(msg) => {
                write!(f, "unable to connect to cluster: {}", msg)
            }
            ClusterError::Fetch { context, message } => {
                write!(f, "{}: {}", context, message)
            }
        }
    }
}

impl std::error::Error for ClusterError {}
