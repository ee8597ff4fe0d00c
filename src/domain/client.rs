//! Client connection identity and transport handle.
//!
//! [`ClientId`] is the opaque identity token assigned to every WebSocket
//! connection at open time. [`ClientHandle`] is the core's view of the
//! transport: it can send frames and request a close, but owns nothing of
//! the socket itself — frames are queued on an outbound channel drained by
//! the connection's writer task.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Unique identifier for a WebSocket client connection.
///
/// Wraps a UUID v4. Generated once when the connection is opened and
/// immutable thereafter. Used as the key in the server's connection map and
/// as the owner marker in the
/// [`SubscriptionRegistry`](super::SubscriptionRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    /// Creates a new random `ClientId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound traffic for a single connection, consumed by its writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame containing a serialized protocol message.
    Frame(String),
    /// Close the connection with the given code and reason. The writer task
    /// emits the close frame and stops draining the channel.
    Close(u16, String),
}

/// Handle to a connected WebSocket client.
///
/// Clones share the same identity and outbound channel. Two handles compare
/// equal iff they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    outbound: mpsc::Sender<Outbound>,
}

impl ClientHandle {
    /// Creates a handle for a newly opened connection.
    ///
    /// The receiving half of `outbound` must be drained by the connection's
    /// writer task.
    #[must_use]
    pub fn new(outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: ClientId::new(),
            outbound,
        }
    }

    /// Returns this connection's identity token.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Queues a text frame for delivery to the client.
    ///
    /// Silently drops the frame if the connection's writer task has already
    /// terminated.
    pub async fn send(&self, frame: String) {
        let _ = self.outbound.send(Outbound::Frame(frame)).await;
    }

    /// Requests that the connection be closed with the given code and reason.
    ///
    /// No-op if the connection is already gone.
    pub async fn close(&self, code: u16, reason: String) {
        let _ = self.outbound.send(Outbound::Close(code, reason)).await;
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = ClientId::new();
        let b = ClientId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_uuid_format() {
        let id = ClientId::new();
        let s = format!("{id}");
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[tokio::test]
    async fn send_queues_frame() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = ClientHandle::new(tx);
        client.send("{\"type\":\"connection_ack\"}".to_string()).await;
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame("{\"type\":\"connection_ack\"}".to_string()))
        );
    }

    #[tokio::test]
    async fn close_queues_close_with_code() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = ClientHandle::new(tx);
        client.close(4401, "unauthorized".to_string()).await;
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close(4401, "unauthorized".to_string()))
        );
    }

    #[tokio::test]
    async fn send_after_writer_gone_is_silent() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let client = ClientHandle::new(tx);
        client.send("dropped".to_string()).await;
    }

    #[tokio::test]
    async fn clones_share_identity() {
        let (tx, _rx) = mpsc::channel(4);
        let client = ClientHandle::new(tx);
        let other = client.clone();
        assert_eq!(client, other);
        assert_eq!(client.id(), other.id());
    }
}
