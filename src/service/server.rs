//! The `graphql-transport-ws` protocol state machine.
//!
//! [`SubscriptionServer`] is bound to the transport's connection lifecycle
//! callbacks (`on_open` / `on_message` / `on_close` / `on_error`). It owns
//! one [`ConnectionMeta`] per open connection, delegates parsing to the
//! message codec, subscription bookkeeping to the
//! [`SubscriptionRegistry`], and lifecycle notifications to the registered
//! [`EventHandler`]s.
//!
//! Per connection the states are `AwaitingInit → Initializing → Accepted`,
//! with closed reachable from any of them. Every protocol violation is
//! caught at the single message boundary and converted into a close frame
//! carrying the violation's close code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use super::event_handlers::{EventHandler, EventHandlers};
use super::resolver::OperationResolver;
use crate::domain::{ClientHandle, ClientId, ConnectionMeta, Message, SubscriptionRegistry};
use crate::error::{ConnectionError, UNKNOWN_CLOSE_CODE};

/// The WebSocket sub-protocol this server speaks.
pub const SUB_PROTOCOL: &str = "graphql-transport-ws";

/// GraphQL subscription server over WebSocket.
///
/// Cheap to clone; clones share the connection map, subscription registry,
/// and handler set, which live for the server's lifetime.
/// [`ConnectionMeta`] entries are scoped to a connection's lifetime and
/// released deterministically in [`Self::on_close`].
#[derive(Clone)]
pub struct SubscriptionServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    clients: RwLock<HashMap<ClientId, ConnectionMeta>>,
    subscriptions: SubscriptionRegistry,
    event_handlers: EventHandlers,
    resolver: Arc<dyn OperationResolver>,
    init_timeout: Duration,
}

impl fmt::Debug for SubscriptionServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionServer")
            .field("init_timeout", &self.inner.init_timeout)
            .finish_non_exhaustive()
    }
}

impl SubscriptionServer {
    /// Creates a new server.
    ///
    /// `init_timeout` is the handshake window: a connection that has not
    /// sent `connection_init` within it is closed with code 4408.
    #[must_use]
    pub fn new(resolver: Arc<dyn OperationResolver>, init_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                clients: RwLock::new(HashMap::new()),
                subscriptions: SubscriptionRegistry::new(),
                event_handlers: EventHandlers::new(),
                resolver,
                init_timeout,
            }),
        }
    }

    /// Registers an event handler for connection and subscription events.
    pub async fn add_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner.event_handlers.register(handler).await;
    }

    /// Unregisters a previously added event handler.
    pub async fn remove_event_handler(&self, handler: &Arc<dyn EventHandler>) {
        self.inner.event_handlers.unregister(handler).await;
    }

    /// Returns the global subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.subscriptions
    }

    /// A new WebSocket connection has been established.
    ///
    /// Starts the one-shot handshake-deadline timer and registers the
    /// connection in `AwaitingInit` state. The timer's cancellation handle
    /// is owned by the connection's [`ConnectionMeta`], which guarantees a
    /// single cancel across all exit paths.
    pub async fn on_open(&self, client: ClientHandle) {
        let deadline = self.inner.init_timeout;
        let timer_client = client.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let error = ConnectionError::InitTimeout;
            tracing::debug!(client = %timer_client.id(), "handshake deadline exceeded");
            timer_client
                .close(error.close_code(), error.to_string())
                .await;
        });

        self.inner
            .clients
            .write()
            .await
            .insert(client.id(), ConnectionMeta::new(timer.abort_handle()));
        tracing::debug!(client = %client.id(), "connection opened");
    }

    /// A text frame arrived on an open connection.
    ///
    /// Any connection-fatal protocol error raised while handling the frame
    /// closes the connection with that error's code; the connection stays
    /// registered until the transport's close callback fires.
    ///
    /// # Panics
    ///
    /// Panics if `client` was never registered through [`Self::on_open`].
    /// That is a bug in the transport wiring, not client misbehavior.
    pub async fn on_message(&self, client: &ClientHandle, raw: &str) {
        if let Err(error) = self.handle_message(client, raw).await {
            tracing::debug!(client = %client.id(), %error, "protocol violation, closing");
            client.close(error.close_code(), error.to_string()).await;
        }
    }

    /// The connection has been closed by either side.
    ///
    /// Tears down every subscription owned by the connection (notifying
    /// subscribers in the order the subscriptions were created) and discards
    /// its state, cancelling a still-pending handshake timer.
    pub async fn on_close(&self, client: &ClientHandle) {
        let removed = self.inner.subscriptions.remove_all(client.id()).await;
        for id in &removed {
            self.inner.event_handlers.dispatch_complete(id).await;
        }
        self.inner.clients.write().await.remove(&client.id());
        tracing::debug!(
            client = %client.id(),
            subscriptions = removed.len(),
            "connection closed"
        );
    }

    /// The transport reported an error on this connection.
    pub async fn on_error<E: fmt::Display>(&self, client: &ClientHandle, error: E) {
        tracing::error!(client = %client.id(), %error, "transport error");
        client.close(UNKNOWN_CLOSE_CODE, String::new()).await;
    }

    async fn handle_message(
        &self,
        client: &ClientHandle,
        raw: &str,
    ) -> Result<(), ConnectionError> {
        let message = Message::parse(raw)?;
        tracing::debug!(
            client = %client.id(),
            message_type = message.message_type(),
            "< message"
        );

        match message {
            Message::ConnectionInit { payload } => {
                self.handle_connection_init(client, payload).await
            }
            Message::Subscribe {
                id,
                query,
                operation_name,
                variables,
            } => {
                self.handle_subscribe(client, id, &query, operation_name, variables)
                    .await
            }
            Message::Complete { id } => self.handle_complete(client, &id).await,
            // Parseable, but never valid in the client → server direction.
            other => Err(ConnectionError::InvalidMessage(format!(
                "Unsupported type '{}'",
                other.message_type()
            ))),
        }
    }

    /// Handles `connection_init`: marks the connection initialized and runs
    /// the authorization decision in its own task, so frames that arrive
    /// while the decision is pending are still processed (and rejected
    /// as unauthorized — acceptance is never applied retroactively).
    async fn handle_connection_init(
        &self,
        client: &ClientHandle,
        payload: Option<Value>,
    ) -> Result<(), ConnectionError> {
        {
            let mut clients = self.inner.clients.write().await;
            let Some(meta) = clients.get_mut(&client.id()) else {
                unreachable!("message from untracked connection {}", client.id());
            };
            meta.mark_initialised()?;
        }

        let server = self.clone();
        let client = client.clone();
        tokio::spawn(async move {
            let accepted = server
                .inner
                .event_handlers
                .dispatch_init(&client, payload.as_ref())
                .await;

            if !accepted {
                let error = ConnectionError::ConnectionDenied;
                client.close(error.close_code(), error.to_string()).await;
                return;
            }

            {
                let mut clients = server.inner.clients.write().await;
                // The connection may have gone away while the decision was
                // pending.
                let Some(meta) = clients.get_mut(&client.id()) else {
                    return;
                };
                meta.accept();
            }
            client.send(Message::connection_ack(None).to_json()).await;
            tracing::debug!(client = %client.id(), "connection accepted");
        });

        Ok(())
    }

    /// Handles `subscribe`: requires an accepted connection, claims the id
    /// before resolving the query, and fans the operation out to
    /// subscribers. Resolution failures are query-level: they produce an
    /// `error` message for this id and leave the connection open.
    async fn handle_subscribe(
        &self,
        client: &ClientHandle,
        id: String,
        query: &str,
        operation_name: Option<String>,
        variables: Option<Value>,
    ) -> Result<(), ConnectionError> {
        {
            let clients = self.inner.clients.read().await;
            let Some(meta) = clients.get(&client.id()) else {
                unreachable!("message from untracked connection {}", client.id());
            };
            if !meta.is_accepted() {
                return Err(ConnectionError::Unauthorized);
            }
        }

        // Claim the id before resolution so a duplicate arriving while the
        // query is being resolved is rejected.
        self.inner.subscriptions.subscribe(&id, client.id()).await?;

        match self
            .inner
            .resolver
            .resolve(query, operation_name.as_deref(), variables.as_ref())
        {
            Ok(operation) => {
                self.inner
                    .event_handlers
                    .dispatch_subscribe(&id, client, &operation, variables.as_ref())
                    .await;
            }
            Err(errors) => {
                tracing::error!(
                    client = %client.id(),
                    subscription = %id,
                    ?errors,
                    "operation resolution failed"
                );
                client
                    .send(Message::error(id.as_str(), &errors).to_json())
                    .await;
            }
        }
        Ok(())
    }

    /// Handles `complete`: requires an accepted connection, removes the
    /// subscription (owner-checked), and notifies subscribers.
    async fn handle_complete(
        &self,
        client: &ClientHandle,
        id: &str,
    ) -> Result<(), ConnectionError> {
        {
            let clients = self.inner.clients.read().await;
            let Some(meta) = clients.get(&client.id()) else {
                unreachable!("message from untracked connection {}", client.id());
            };
            if !meta.is_accepted() {
                return Err(ConnectionError::Unauthorized);
            }
        }

        self.inner.subscriptions.unsubscribe(id, client.id()).await?;
        self.inner.event_handlers.dispatch_complete(id).await;
        Ok(())
    }
}
