//! Domain layer: protocol messages, connection state, and the registry.
//!
//! This module contains the transport-independent building blocks of the
//! `graphql-transport-ws` state machine: client identity, the message codec,
//! per-connection handshake state, and the global subscription registry.

pub mod client;
pub mod connection;
pub mod message;
pub mod registry;

pub use client::{ClientHandle, ClientId, Outbound};
pub use connection::ConnectionMeta;
pub use message::Message;
pub use registry::SubscriptionRegistry;
