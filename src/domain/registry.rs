//! Global subscription registry.
//!
//! [`SubscriptionRegistry`] maps client-chosen subscription ids to the
//! connection that owns them. Ids are unique only among currently-open
//! subscriptions: once completed or torn down, an id may be reused by any
//! connection.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::ClientId;
use crate::error::ConnectionError;

/// One registered subscription.
#[derive(Debug, Clone, Copy)]
struct SubscriptionEntry {
    owner: ClientId,
    /// Monotonic insertion marker, used to report teardown removals in the
    /// order the subscriptions were created.
    seq: u64,
}

/// Process-wide mapping from subscription id to owning connection.
///
/// # Concurrency
///
/// Shared across all connection tasks; every access goes through an inner
/// [`RwLock`]. Each mutation is a single lock acquisition, so the
/// check-then-insert in [`Self::subscribe`] is atomic with respect to a
/// concurrent duplicate.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    subscriptions: HashMap<String, SubscriptionEntry>,
    next_seq: u64,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::DuplicateSubscriber`] if `id` is already
    /// registered, regardless of which connection owns it.
    pub async fn subscribe(&self, id: &str, owner: ClientId) -> Result<(), ConnectionError> {
        let mut inner = self.inner.write().await;
        if inner.subscriptions.contains_key(id) {
            return Err(ConnectionError::DuplicateSubscriber(id.to_string()));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .subscriptions
            .insert(id.to_string(), SubscriptionEntry { owner, seq });
        Ok(())
    }

    /// Removes `id` on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidMessage`] if `id` is not registered
    /// or is owned by a different connection; no entry is removed in either
    /// case.
    pub async fn unsubscribe(&self, id: &str, requester: ClientId) -> Result<(), ConnectionError> {
        let mut inner = self.inner.write().await;
        match inner.subscriptions.get(id) {
            Some(entry) if entry.owner == requester => {
                inner.subscriptions.remove(id);
                Ok(())
            }
            _ => Err(ConnectionError::InvalidMessage(
                "The provided subscription is not established or does not belong to this client"
                    .to_string(),
            )),
        }
    }

    /// Removes every subscription owned by `owner`, returning the removed ids
    /// in their original insertion order.
    pub async fn remove_all(&self, owner: ClientId) -> Vec<String> {
        let mut inner = self.inner.write().await;
        let mut removed: Vec<(u64, String)> = inner
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, entry)| (entry.seq, id.clone()))
            .collect();
        removed.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, id) in &removed {
            inner.subscriptions.remove(id);
        }
        removed.into_iter().map(|(_, id)| id).collect()
    }

    /// Returns the number of open subscriptions across all connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.subscriptions.len()
    }

    /// Returns `true` if no subscriptions are open.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.subscriptions.is_empty()
    }
}
