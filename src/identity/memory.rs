//! In-process identity service.
//!
//! Accounts and the current session live in memory. Sign-in, sign-up and
//! sign-out publish the same change events a hosted service would, and
//! `emit` lets callers push arbitrary events (refresh, expiry) at will.
//! `hold_fetch` parks the next `fetch_current_session` until released, which
//! is how slow or failing session restores are reproduced.
//!
//! Events are emitted while the state lock is held, so `current_session`
//! always matches the last event listeners received.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use super::listeners::{ListenerRegistry, Subscription};
use super::types::{IdentityError, Session, SessionEvent, SessionUser, SignUpOutcome, SignUpProfile};
use super::IdentityService;

const SESSION_LIFETIME_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

type FetchResult = Result<Option<Session>, IdentityError>;

struct Account {
    password: String,
    user: SessionUser,
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<String, Account>,
    current: Option<Session>,
    fail_fetch: bool,
}

/// Identity service backed by in-memory accounts.
#[derive(Default)]
pub struct MemoryIdentity {
    listeners: ListenerRegistry,
    inner: Mutex<MemoryInner>,
    fetch_gate: Mutex<Option<oneshot::Receiver<FetchResult>>>,
}

/// Releases a fetch parked by [`MemoryIdentity::hold_fetch`].
pub struct FetchRelease(oneshot::Sender<FetchResult>);

impl FetchRelease {
    /// Complete the parked fetch with `session`.
    pub fn resolve(self, session: Option<Session>) {
        let _ = self.0.send(Ok(session));
    }

    /// Complete the parked fetch with an error.
    pub fn fail(self, err: IdentityError) {
        let _ = self.0.send(Err(err));
    }
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a confirmed account.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, full_name: Option<&str>) -> Self {
        let user = SessionUser {
            id: Uuid::new_v4().to_string(),
            email: Some(normalize(email)),
            full_name: full_name.map(str::to_owned),
        };
        self.lock().accounts.insert(normalize(email), Account { password: password.to_owned(), user });
        self
    }

    /// Start with a persisted session, as if restored from a previous run.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        self.lock().current = Some(session);
        self
    }

    /// Make every unparked `fetch_current_session` fail.
    #[must_use]
    pub fn failing_fetch(self) -> Self {
        self.lock().fail_fetch = true;
        self
    }

    /// Park the next `fetch_current_session` until the returned release fires.
    /// Dropping the release completes the fetch with an error.
    #[must_use]
    pub fn hold_fetch(&self) -> FetchRelease {
        let (tx, rx) = oneshot::channel();
        *self.fetch_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(rx);
        FetchRelease(tx)
    }

    /// Push `event` to every listener, updating the current session to match.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let mut inner = self.lock();
        inner.current.clone_from(&event.session);
        self.listeners.emit(&event)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.lock().current.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Issue a fresh session for `user` valid for one hour from now.
#[must_use]
pub fn issue_session(user: SessionUser) -> Session {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    Session {
        access_token: Uuid::new_v4().simple().to_string(),
        refresh_token: Uuid::new_v4().simple().to_string(),
        token_type: "bearer".into(),
        expires_in: Some(SESSION_LIFETIME_SECS.unsigned_abs()),
        expires_at: Some(now + SESSION_LIFETIME_SECS),
        user,
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait::async_trait]
impl IdentityService for MemoryIdentity {
    async fn fetch_current_session(&self) -> Result<Option<Session>, IdentityError> {
        let gate = self
            .fetch_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(gate) = gate {
            debug!("session fetch parked");
            return gate
                .await
                .unwrap_or_else(|_| Err(IdentityError::Request("fetch abandoned".into())));
        }

        let inner = self.lock();
        if inner.fail_fetch {
            return Err(IdentityError::Request("identity service unreachable".into()));
        }
        Ok(inner.current.clone())
    }

    fn on_session_changed(&self) -> Subscription {
        self.listeners.register()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .get(&normalize(email))
            .filter(|account| account.password == password)
            .ok_or(IdentityError::InvalidCredentials)?;
        let session = issue_session(account.user.clone());
        inner.current = Some(session.clone());
        self.listeners.emit(&SessionEvent::signed_in(session.clone()));
        drop(inner);
        info!(user_id = %session.user_id(), "signed in");
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, IdentityError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Response {
                status: 422,
                message: format!("Password should be at least {MIN_PASSWORD_LEN} characters."),
            });
        }

        let mut inner = self.lock();
        let key = normalize(email);
        if inner.accounts.contains_key(&key) {
            return Err(IdentityError::Response { status: 422, message: "User already registered".into() });
        }
        let user = SessionUser {
            id: Uuid::new_v4().to_string(),
            email: Some(key.clone()),
            full_name: Some(profile.full_name.clone()),
        };
        inner.accounts.insert(key, Account { password: password.to_owned(), user: user.clone() });
        let session = issue_session(user);
        inner.current = Some(session.clone());
        self.listeners.emit(&SessionEvent::signed_in(session.clone()));
        drop(inner);
        info!(user_id = %session.user_id(), "account created");
        Ok(SignUpOutcome { user: Some(session.user.clone()), session: Some(session) })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let mut inner = self.lock();
        inner.current = None;
        self.listeners.emit(&SessionEvent::signed_out());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
