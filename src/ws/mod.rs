//! WebSocket layer: upgrade endpoint and the per-connection bridge.
//!
//! The endpoint at `/graphql` upgrades to a WebSocket negotiated with the
//! `graphql-transport-ws` sub-protocol and feeds the transport's events into
//! the [`SubscriptionServer`](crate::service::SubscriptionServer) callbacks.

pub mod connection;
pub mod handler;
