//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and identity-aware pages read this state. Only the
//! `SessionStore` writes it, in reaction to its own async callbacks.
//!
//! DESIGN
//! ======
//! The store owns the writer half of a `watch` channel. Two tasks write
//! through it: the one-shot initial fetch and the listener draining the
//! identity subscription. Readers hold `AuthWatch` clones and never see the
//! writer.
//!
//! Teardown takes the writer out of its mutex. Every write happens under that
//! mutex, so once teardown returns no late fetch result or buffered event can
//! land, and `AuthWatch::changed` reports the store as closed.
//!
//! ERROR HANDLING
//! ==============
//! The fetch runs in its own task. A failed or panicking fetch still resolves
//! the store as signed out.
//!
//! TRADE-OFFS
//! ==========
//! The initial fetch result counts as older than any delivered event. If an
//! event arrives first, the fetch only flips `resolved`. Readers may skip
//! intermediate states but always end on the newest one.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::identity::{IdentityError, IdentityService, Session, SessionEvent, SessionUser, SubscriptionHandle};

// =============================================================================
// AUTH STATE
// =============================================================================

/// Snapshot of the authentication state: current session, its user, and
/// whether the initial session fetch has completed.
///
/// `user` is present exactly when `session` is; there are no public mutators.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    session: Option<Session>,
    user: Option<SessionUser>,
    resolved: bool,
}

impl AuthState {
    /// State before the initial fetch completes.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn set_session(&mut self, session: Option<Session>) {
        self.user = session.as_ref().map(|s| s.user.clone());
        self.session = session;
    }
}

#[cfg(test)]
impl AuthState {
    /// Resolved state holding `session`, for guard and navigator tests.
    pub(crate) fn resolved_with(session: Option<Session>) -> Self {
        let mut state = Self { resolved: true, ..Self::default() };
        state.set_session(session);
        state
    }

    /// Unresolved state already holding `session`.
    pub(crate) fn pending_with(session: Option<Session>) -> Self {
        let mut state = Self::default();
        state.set_session(session);
        state
    }
}

// =============================================================================
// AUTH WATCH
// =============================================================================

/// Read-only handle on the store's state.
#[derive(Clone, Debug)]
pub struct AuthWatch {
    rx: watch::Receiver<AuthState>,
}

impl AuthWatch {
    /// Latest snapshot. Never blocks.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// Latest snapshot, marking it seen so `changed` waits for the next write.
    pub fn latest(&mut self) -> AuthState {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next change. `None` once the store is torn down or dropped.
    pub async fn changed(&mut self) -> Option<AuthState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the initial fetch has completed.
    pub async fn resolved(&mut self) -> Option<AuthState> {
        self.wait_until(AuthState::is_resolved).await
    }

    /// Wait until `pred` holds, checking the current snapshot first.
    pub async fn wait_until(&mut self, pred: impl FnMut(&AuthState) -> bool) -> Option<AuthState> {
        self.rx.wait_for(pred).await.ok().map(|state| (*state).clone())
    }
}

// =============================================================================
// WRITER
// =============================================================================

struct Writer {
    tx: Option<watch::Sender<AuthState>>,
    saw_event: bool,
}

struct Shared {
    writer: Mutex<Writer>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Writer> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_event(&self, event: SessionEvent) {
        let mut writer = self.lock();
        let Some(tx) = &writer.tx else {
            debug!(change = %event.change, "discarding session event after teardown");
            return;
        };
        debug!(change = %event.change, signed_in = event.session.is_some(), "session changed");
        tx.send_modify(|state| state.set_session(event.session));
        writer.saw_event = true;
    }

    fn apply_fetch(&self, result: Result<Option<Session>, IdentityError>) {
        let session = result.unwrap_or_else(|e| {
            warn!(error = %e, "initial session fetch failed, treating as signed out");
            None
        });

        let writer = self.lock();
        let saw_event = writer.saw_event;
        let Some(tx) = &writer.tx else {
            debug!("discarding initial session fetch after teardown");
            return;
        };
        tx.send_modify(|state| {
            if !saw_event {
                state.set_session(session);
            }
            state.resolved = true;
        });
        let state = tx.borrow();
        info!(authenticated = state.is_authenticated(), user_id = state.user_id().unwrap_or("-"), "auth state resolved");
    }

    fn close(&self) -> bool {
        self.lock().tx.take().is_some()
    }

    fn is_closed(&self) -> bool {
        self.lock().tx.is_none()
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

struct Listener {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

/// Owner of the process-wide `AuthState`.
///
/// Construct once at start-up, hand `AuthWatch` clones to readers, and call
/// `teardown` (or drop the store) at shutdown. `initialize` and `subscribe`
/// spawn tasks and must run inside a Tokio runtime.
pub struct SessionStore {
    identity: Arc<dyn IdentityService>,
    shared: Arc<Shared>,
    reader: watch::Receiver<AuthState>,
    initialized: AtomicBool,
    listener: Mutex<Option<Listener>>,
    subscribed: AtomicBool,
}

impl SessionStore {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        let (tx, reader) = watch::channel(AuthState::pending());
        Self {
            identity,
            shared: Arc::new(Shared { writer: Mutex::new(Writer { tx: Some(tx), saw_event: false }) }),
            reader,
            initialized: AtomicBool::new(false),
            listener: Mutex::new(None),
            subscribed: AtomicBool::new(false),
        }
    }

    /// Construct, subscribe, and start the initial fetch.
    #[must_use]
    pub fn start(identity: Arc<dyn IdentityService>) -> Self {
        let store = Self::new(identity);
        store.subscribe();
        store.initialize();
        store
    }

    /// Start the one asynchronous fetch of the persisted session.
    ///
    /// Returns `false` if the fetch was already started.
    pub fn initialize(&self) -> bool {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("session store already initialized");
            return false;
        }
        let identity = self.identity.clone();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let fetch = tokio::spawn(async move { identity.fetch_current_session().await });
            let result = fetch
                .await
                .unwrap_or_else(|e| Err(IdentityError::TaskFailed(e.to_string())));
            shared.apply_fetch(result);
        });
        true
    }

    /// Register for session-changed events.
    ///
    /// Returns `false` if already subscribed or torn down.
    pub fn subscribe(&self) -> bool {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            debug!("session store already subscribed");
            return false;
        }

        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shared.is_closed() {
            return false;
        }
        let mut subscription = self.identity.on_session_changed();
        let handle = subscription.handle();
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                shared.apply_event(event);
            }
            debug!("session listener finished");
        });
        *listener = Some(Listener { handle, task });
        true
    }

    /// Release the identity subscription and stop accepting writes.
    /// Idempotent; also runs on drop.
    pub fn teardown(&self) {
        let closed = self.shared.close();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.handle.cancel();
            listener.task.abort();
        }
        if closed {
            info!("session store torn down");
        }
    }

    /// Latest snapshot. Never blocks.
    #[must_use]
    pub fn current_state(&self) -> AuthState {
        self.reader.borrow().clone()
    }

    /// New read-only handle on the state. Its `changed` waits for the next
    /// write after this call.
    #[must_use]
    pub fn watch(&self) -> AuthWatch {
        let mut rx = self.reader.clone();
        rx.borrow_and_update();
        AuthWatch { rx }
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.teardown();
    }
}
