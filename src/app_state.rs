//! Shared application state injected into the Axum handlers.

use crate::service::SubscriptionServer;

/// Shared application state available to handlers via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The protocol server shared by all connections.
    pub server: SubscriptionServer,
    /// Capacity of each connection's outbound frame queue.
    pub outbound_buffer: usize,
}
