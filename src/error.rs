//! Protocol error types with WebSocket close-code mapping.
//!
//! [`ConnectionError`] is the connection-fatal error family. Each variant
//! maps to a specific close code sent in the server-initiated close frame.
//! [`QueryError`] is the recoverable operation-level error delivered as an
//! `error` message scoped to a single subscription id.

use serde::{Deserialize, Serialize};

/// Close code used when no more specific protocol error applies.
pub const UNKNOWN_CLOSE_CODE: u16 = 4400;

/// Connection-fatal protocol error.
///
/// Every variant carries a fixed close code. These errors are caught at the
/// single message-handling boundary in
/// [`SubscriptionServer`](crate::service::SubscriptionServer) and converted
/// into a close frame; they are never retried.
///
/// # Close Codes
///
/// | Variant               | Code |
/// |-----------------------|------|
/// | `InvalidMessage`      | 4400 |
/// | `ConnectionDenied`    | 4400 |
/// | `Unauthorized`        | 4401 |
/// | `InitTimeout`         | 4408 |
/// | `DuplicateSubscriber` | 4409 |
/// | `TooManyInitRequests` | 4429 |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The client sent a frame that is not a valid protocol message, or a
    /// `complete` for a subscription it does not own.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// An init handler denied the connection, or a handler failed while
    /// deciding. Not distinguishable on the wire from an unclassified error.
    #[error("access denied")]
    ConnectionDenied,

    /// The client attempted an operation before the connection was accepted.
    #[error("unauthorized")]
    Unauthorized,

    /// The client did not send `connection_init` within the handshake window.
    #[error("connection initialisation timeout")]
    InitTimeout,

    /// The subscription id is already in use by an open subscription.
    #[error("subscriber for '{0}' already exists")]
    DuplicateSubscriber(String),

    /// A second `connection_init` was received on the same connection.
    #[error("too many initialisation requests")]
    TooManyInitRequests,
}

impl ConnectionError {
    /// Returns the WebSocket close code for this variant.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Self::InvalidMessage(_) | Self::ConnectionDenied => 4400,
            Self::Unauthorized => 4401,
            Self::InitTimeout => 4408,
            Self::DuplicateSubscriber(_) => 4409,
            Self::TooManyInitRequests => 4429,
        }
    }
}

/// Operation-level GraphQL error object.
///
/// Serialized into the payload of an `error` message. Unlike
/// [`ConnectionError`], these never terminate the connection: the failing
/// subscription id receives the error and every other subscription on the
/// connection is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl QueryError {
    /// Creates a new `QueryError` with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
