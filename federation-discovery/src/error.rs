//! Errors that can occur while discovering the federation topology.

use thiserror::Error;

/// The class of a discovery failure.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorKind {
    /// The transport is shutting down and cannot issue more requests.
    ///
    /// Never produced by the bundled transports, which signal shutdown through
    /// [`DiscoveryTransport::create_context`](crate::transport::DiscoveryTransport::create_context).
    /// Custom transports return it from a discovery call whose underlying connection is gone;
    /// the observer then stops as if [`stop`](crate::FederationObserver::stop) had been called.
    TransportUnavailable,
    /// The server does not implement federation discovery.
    NotImplemented,
    /// The server or the network path to it is unavailable.
    Unavailable,
    /// The server rejected the request because it is overloaded.
    Overloaded,
    /// The request did not complete in time.
    Timeout,
    /// The server considered the request malformed.
    BadRequest,
    /// The client is not allowed to list the federation databases.
    Unauthorized,
    /// Any other server or decoding failure.
    Internal,
}

impl ErrorKind {
    /// Whether a request failing this way may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::Overloaded | Self::Timeout | Self::Internal
        )
    }
}

/// A failed discovery attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Federation discovery failed ({kind:?}): {message}")]
pub struct DiscoveryError {
    kind: ErrorKind,
    message: String,
}

impl DiscoveryError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The class of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// A human readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the server does not support federation discovery.
    pub fn is_not_implemented(&self) -> bool {
        self.kind == ErrorKind::NotImplemented
    }
}

/// An error in the observer settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The discovery endpoint could not be parsed.
    #[error(r#"Invalid discovery endpoint "{endpoint}": {reason}"#)]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The database path is empty.
    #[error("The database path must not be empty")]
    EmptyDatabase,
    /// The backoff multiplier must be at least 1.
    #[error("Invalid backoff multiplier {0}, expected a value >= 1.0")]
    InvalidMultiplier(f64),
    /// The randomization factor must be within `[0, 1)`.
    #[error("Invalid randomization factor {0}, expected a value in [0, 1)")]
    InvalidRandomizationFactor(f64),
}
