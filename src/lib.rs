//! # graphql-ws-gateway
//!
//! GraphQL subscription server implementing the server side of the
//! [`graphql-transport-ws`](https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md)
//! protocol over WebSocket.
//!
//! This crate is the protocol state machine, independent of any GraphQL
//! execution engine: it decides when a connection may run operations,
//! enforces exactly one initialisation per connection, tracks which
//! subscription ids belong to which connection, and fans lifecycle events
//! out to pluggable handlers. Query execution is delegated to
//! [`Subscriber`](service::Subscriber) implementations registered by the
//! embedding application.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, sub-protocol graphql-transport-ws)
//!     │
//!     ├── WS bridge (ws/)
//!     │
//!     ├── SubscriptionServer (service/)
//!     │     ├── Message codec (domain/message)
//!     │     ├── ConnectionMeta (domain/connection)
//!     │     ├── SubscriptionRegistry (domain/registry)
//!     │     ├── EventHandlers (service/event_handlers)
//!     │     └── OperationResolver (service/resolver)
//!     │
//!     └── InitHandler / Subscriber implementations (embedding app)
//! ```

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
