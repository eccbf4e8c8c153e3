//! Listener registry: session-changed callbacks expressed as channels.
//!
//! DESIGN
//! ======
//! Every registration owns an unbounded mpsc channel, so one listener sees
//! events in exactly the order `emit` was called. The registry keeps the
//! senders; a `Subscription` keeps the receiver plus a weak handle back to
//! the registry. Cancelling (explicitly or by dropping the subscription)
//! removes the sender, which closes the channel for the receiving task.
//!
//! Listeners whose receiver is gone are pruned on the next `emit`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use super::types::SessionEvent;

type ListenerMap = BTreeMap<u64, mpsc::UnboundedSender<SessionEvent>>;

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    listeners: ListenerMap,
}

/// Set of active session-changed listeners for one identity service.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener and return its subscription.
    #[must_use]
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, tx);
        debug!(listener_id = id, active = inner.listeners.len(), "session listener registered");
        Subscription { handle: SubscriptionHandle { id, registry: Arc::downgrade(&self.inner) }, events: rx }
    }

    /// Deliver `event` to every active listener. Returns the number reached.
    pub fn emit(&self, event: &SessionEvent) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .listeners
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        inner.listeners.len()
    }

    /// Number of registrations that have not been cancelled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Cloneable cancel handle for one registration.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    id: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl SubscriptionHandle {
    /// Remove the registration. Returns `false` if it was already gone.
    pub fn cancel(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.listeners.remove(&self.id).is_some();
        if removed {
            debug!(listener_id = self.id, active = inner.listeners.len(), "session listener cancelled");
        }
        removed
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .contains_key(&self.id)
        })
    }
}

/// Receiving side of a listener registration. Dropping it cancels.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Subscription {
    /// Next event, or `None` once the registration is cancelled and drained.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

#[cfg(test)]
#[path = "listeners_test.rs"]
mod tests;
