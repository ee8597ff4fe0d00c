//! Pluggable event handlers and the dispatch fan-out.
//!
//! Handlers register with the server as [`EventHandler`] values, each
//! exposing up to two capabilities: [`InitHandler`] (authorize a connection)
//! and [`Subscriber`] (react to subscription lifecycle). Dispatch goes by
//! capability accessor, not runtime type inspection, so the capability set
//! stays closed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future;
use serde_json::Value;
use tokio::sync::RwLock;

use super::resolver::ResolvedOperation;
use crate::domain::ClientHandle;

/// Authorization capability for `connection_init`.
#[async_trait]
pub trait InitHandler: Send + Sync {
    /// Decides whether the connection may run operations.
    ///
    /// The handler must not send anything to the client; the handle is
    /// provided because it carries connection identity. Resolving `false`
    /// denies the connection.
    ///
    /// # Errors
    ///
    /// A failure is logged by the dispatcher and counts as a deny vote. The
    /// correct way to deny is returning `Ok(false)`; errors are for faults
    /// inside the handler itself.
    async fn on_connection_init(
        &self,
        client: &ClientHandle,
        payload: Option<&Value>,
    ) -> anyhow::Result<bool>;
}

/// Subscription lifecycle capability.
///
/// Implemented by whatever serves subscription data. `on_subscribe` is
/// expected to start its own async execution and return promptly; the
/// dispatcher calls it on the connection's message path.
pub trait Subscriber: Send + Sync {
    /// Called when an accepted client opens a new subscription.
    fn on_subscribe(
        &self,
        id: &str,
        client: &ClientHandle,
        operation: &ResolvedOperation,
        variables: Option<&Value>,
    );

    /// Called when a subscription ends, by client request or disconnect.
    fn on_complete(&self, id: &str);
}

/// A registrable event handler with an explicit, closed set of capabilities.
///
/// A handler may expose either capability, both, or none (registered for
/// future extension). The default accessors return `None`.
pub trait EventHandler: Send + Sync {
    /// This handler's [`InitHandler`] capability, if it has one.
    fn init_handler(&self) -> Option<&dyn InitHandler> {
        None
    }

    /// This handler's [`Subscriber`] capability, if it has one.
    fn subscriber(&self) -> Option<&dyn Subscriber> {
        None
    }
}

/// The registered handler set and its dispatch logic.
///
/// Membership is identity-based (`Arc` pointer equality); registering the
/// same handler twice is a no-op, as is unregistering an absent one.
/// Handlers are invoked in registration order wherever order is observable.
#[derive(Default)]
pub struct EventHandlers {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers").finish_non_exhaustive()
    }
}

impl EventHandlers {
    /// Creates an empty handler set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. No-op if the same instance is already registered.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            handlers.push(handler);
        }
    }

    /// Removes a handler. No-op if the instance is not registered.
    pub async fn unregister(&self, handler: &Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .await
            .retain(|h| !Arc::ptr_eq(h, handler));
    }

    /// Returns the number of registered handlers.
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Returns `true` if no handlers are registered.
    pub async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }

    /// Collects every init handler's vote on the connection, concurrently.
    ///
    /// The connection is approved iff every vote is an accept; with no init
    /// handlers registered the result is vacuously `true`.
    pub async fn dispatch_init(&self, client: &ClientHandle, payload: Option<&Value>) -> bool {
        let handlers = self.snapshot().await;
        let votes = handlers
            .iter()
            .filter_map(|h| h.init_handler())
            .map(|h| h.on_connection_init(client, payload));
        join_votes(votes).await
    }

    /// Notifies every subscriber of a new subscription, in registration
    /// order.
    pub async fn dispatch_subscribe(
        &self,
        id: &str,
        client: &ClientHandle,
        operation: &ResolvedOperation,
        variables: Option<&Value>,
    ) {
        for subscriber in self.snapshot().await.iter().filter_map(|h| h.subscriber()) {
            subscriber.on_subscribe(id, client, operation, variables);
        }
    }

    /// Notifies every subscriber of a completed subscription, in
    /// registration order.
    pub async fn dispatch_complete(&self, id: &str) {
        for subscriber in self.snapshot().await.iter().filter_map(|h| h.subscriber()) {
            subscriber.on_complete(id);
        }
    }

    /// Clones the handler list so dispatch never holds the set lock across
    /// handler code.
    async fn snapshot(&self) -> Vec<Arc<dyn EventHandler>> {
        self.handlers.read().await.clone()
    }
}

/// Joins all authorization votes and reduces them fail-closed.
///
/// Every failed future is logged and counted as a deny; the aggregate is an
/// accept only when every vote resolves `Ok(true)`. An empty vote set is an
/// accept.
pub(crate) async fn join_votes<I, F>(votes: I) -> bool
where
    I: IntoIterator<Item = F>,
    F: Future<Output = anyhow::Result<bool>>,
{
    let mut accepted = true;
    for vote in future::join_all(votes).await {
        match vote {
            Ok(approved) => accepted = accepted && approved,
            Err(error) => {
                tracing::error!(%error, "unhandled failure in init handler, denying connection");
                accepted = false;
            }
        }
    }
    accepted
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::resolver::OperationKind;
    use std::future::ready;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct Vote {
        accept: bool,
        calls: AtomicUsize,
    }

    impl Vote {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                accept,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl EventHandler for Vote {
        fn init_handler(&self) -> Option<&dyn InitHandler> {
            Some(self)
        }
    }

    #[async_trait]
    impl InitHandler for Vote {
        async fn on_connection_init(
            &self,
            _client: &ClientHandle,
            _payload: Option<&Value>,
        ) -> anyhow::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accept)
        }
    }

    struct Faulty;

    impl EventHandler for Faulty {
        fn init_handler(&self) -> Option<&dyn InitHandler> {
            Some(self)
        }
    }

    #[async_trait]
    impl InitHandler for Faulty {
        async fn on_connection_init(
            &self,
            _client: &ClientHandle,
            _payload: Option<&Value>,
        ) -> anyhow::Result<bool> {
            anyhow::bail!("backend unavailable")
        }
    }

    struct Recorder {
        label: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl EventHandler for Recorder {
        fn subscriber(&self) -> Option<&dyn Subscriber> {
            Some(self)
        }
    }

    impl Subscriber for Recorder {
        fn on_subscribe(
            &self,
            id: &str,
            _client: &ClientHandle,
            _operation: &ResolvedOperation,
            _variables: Option<&Value>,
        ) {
            if let Ok(mut events) = self.events.lock() {
                events.push(format!("{}:subscribe:{id}", self.label));
            }
        }

        fn on_complete(&self, id: &str) {
            if let Ok(mut events) = self.events.lock() {
                events.push(format!("{}:complete:{id}", self.label));
            }
        }
    }

    fn test_client() -> ClientHandle {
        let (tx, _rx) = mpsc::channel(4);
        ClientHandle::new(tx)
    }

    fn test_operation() -> ResolvedOperation {
        ResolvedOperation {
            kind: OperationKind::Subscription,
            name: None,
            document: "subscription{x}".to_string(),
        }
    }

    #[tokio::test]
    async fn no_init_handlers_is_vacuously_accepted() {
        let handlers = EventHandlers::new();
        assert!(handlers.dispatch_init(&test_client(), None).await);
    }

    #[tokio::test]
    async fn all_accepting_votes_approve() {
        let handlers = EventHandlers::new();
        handlers.register(Vote::new(true)).await;
        handlers.register(Vote::new(true)).await;
        assert!(handlers.dispatch_init(&test_client(), None).await);
    }

    #[tokio::test]
    async fn single_deny_vote_rejects() {
        let handlers = EventHandlers::new();
        let first = Vote::new(true);
        let second = Vote::new(false);
        handlers.register(Arc::clone(&first) as Arc<dyn EventHandler>).await;
        handlers.register(Arc::clone(&second) as Arc<dyn EventHandler>).await;

        assert!(!handlers.dispatch_init(&test_client(), None).await);
        // All handlers are still consulted.
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_handler_counts_as_deny() {
        let handlers = EventHandlers::new();
        handlers.register(Vote::new(true)).await;
        handlers.register(Arc::new(Faulty)).await;
        assert!(!handlers.dispatch_init(&test_client(), None).await);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_noop() {
        let handlers = EventHandlers::new();
        let vote = Vote::new(true);
        handlers.register(Arc::clone(&vote) as Arc<dyn EventHandler>).await;
        handlers.register(Arc::clone(&vote) as Arc<dyn EventHandler>).await;
        assert_eq!(handlers.len().await, 1);

        handlers.dispatch_init(&test_client(), None).await;
        assert_eq!(vote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregister_removes_handler() {
        let handlers = EventHandlers::new();
        let vote = Vote::new(false);
        let handle: Arc<dyn EventHandler> = vote;
        handlers.register(Arc::clone(&handle)).await;
        handlers.unregister(&handle).await;
        assert!(handlers.is_empty().await);
        assert!(handlers.dispatch_init(&test_client(), None).await);
    }

    #[tokio::test]
    async fn subscribers_are_notified_in_registration_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let handlers = EventHandlers::new();
        handlers
            .register(Arc::new(Recorder {
                label: "a",
                events: Arc::clone(&events),
            }))
            .await;
        handlers
            .register(Arc::new(Recorder {
                label: "b",
                events: Arc::clone(&events),
            }))
            .await;

        let client = test_client();
        handlers
            .dispatch_subscribe("1", &client, &test_operation(), None)
            .await;
        handlers.dispatch_complete("1").await;

        let Ok(events) = events.lock() else {
            panic!("event log poisoned");
        };
        assert_eq!(
            *events,
            vec!["a:subscribe:1", "b:subscribe:1", "a:complete:1", "b:complete:1"]
        );
    }

    #[tokio::test]
    async fn join_votes_is_fail_closed() {
        let no_votes: Vec<std::future::Ready<anyhow::Result<bool>>> = Vec::new();
        assert!(join_votes(no_votes).await);
        assert!(join_votes(vec![ready(Ok(true)), ready(Ok(true))]).await);
        assert!(!join_votes(vec![ready(Ok(true)), ready(Ok(false))]).await);
        assert!(
            !join_votes(vec![
                ready(Ok(true)),
                ready(Err(anyhow::anyhow!("boom")))
            ])
            .await
        );
    }
}
