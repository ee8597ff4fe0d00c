//! Per-connection protocol state.
//!
//! [`ConnectionMeta`] tracks how far a single connection has progressed
//! through the `graphql-transport-ws` handshake: whether `connection_init`
//! has been received, and whether the asynchronous authorization decision
//! has accepted the connection. It also owns the cancellation handle for the
//! handshake-deadline timer, guaranteeing the timer is cancelled exactly
//! once across every exit path.

use tokio::task::AbortHandle;

use crate::error::ConnectionError;

/// State tracker for one open WebSocket connection.
///
/// Exclusively owned by the server's connection map for the connection's
/// lifetime. Invariants:
///
/// - `accepted` implies `initialized`.
/// - The timeout handle is present iff the connection is not initialized.
/// - The handle is aborted exactly once: on [`Self::mark_initialised`] or,
///   if the connection closes first, on drop.
#[derive(Debug)]
pub struct ConnectionMeta {
    /// Cancellation handle for the handshake-deadline timer. `None` once the
    /// connection is initialized.
    init_timeout: Option<AbortHandle>,
    initialized: bool,
    accepted: bool,
}

impl ConnectionMeta {
    /// Creates the state for a freshly opened connection.
    ///
    /// `init_timeout` aborts the pending handshake-deadline timer; it must
    /// not have fired yet when the metadata is created.
    #[must_use]
    pub const fn new(init_timeout: AbortHandle) -> Self {
        Self {
            init_timeout: Some(init_timeout),
            initialized: false,
            accepted: false,
        }
    }

    /// Whether `connection_init` has been accepted for processing.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the authorization decision has approved this connection.
    ///
    /// Only an accepted connection may hold subscriptions.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Marks the connection as initialized, cancelling the handshake timer.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::TooManyInitRequests`] if the connection was
    /// already initialized.
    pub fn mark_initialised(&mut self) -> Result<(), ConnectionError> {
        if self.initialized {
            return Err(ConnectionError::TooManyInitRequests);
        }
        self.cancel_init_timeout();
        self.initialized = true;
        Ok(())
    }

    /// Marks the connection as accepted. Irreversible.
    ///
    /// The caller must have confirmed initialization first; the server only
    /// calls this after the init decision resolves for a connection that
    /// passed [`Self::mark_initialised`].
    pub const fn accept(&mut self) {
        self.accepted = true;
    }

    /// Aborts the handshake-deadline timer if it is still pending.
    fn cancel_init_timeout(&mut self) {
        if let Some(handle) = self.init_timeout.take() {
            handle.abort();
        }
    }
}

impl Drop for ConnectionMeta {
    fn drop(&mut self) {
        // The connection closed before initialising; the timer must not fire
        // against a connection the server no longer tracks.
        self.cancel_init_timeout();
    }
}
