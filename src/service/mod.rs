//! Service layer: protocol orchestration, handler dispatch, and operation
//! resolution.

pub mod event_handlers;
pub mod resolver;
pub mod server;

pub use event_handlers::{EventHandler, EventHandlers, InitHandler, Subscriber};
pub use resolver::{DocumentResolver, OperationKind, OperationResolver, ResolvedOperation};
pub use server::{SUB_PROTOCOL, SubscriptionServer};
