//! Supabase Auth (GoTrue) REST client.
//!
//! DESIGN
//! ======
//! Thin HTTP wrapper for `/auth/v1/token`, `/auth/v1/signup` and
//! `/auth/v1/logout`. Pure parsing lives in `parse_session`, `parse_sign_up`
//! and `parse_error` for testability.
//!
//! The client owns session persistence: the current session is mirrored to
//! a `SessionFile` and restored by `fetch_current_session`. A background
//! refresher sleeps until `SESSION_REFRESH_MARGIN_SECS` before expiry, swaps
//! in a fresh token pair and publishes `TokenRefreshed`.
//!
//! Every change to the current session bumps a generation counter under the
//! session lock, and the matching event is emitted before the lock is
//! released. A refresh that raced a sign-in or sign-out sees a newer
//! generation and drops its result.
//!
//! ERROR HANDLING
//! ==============
//! A refresh rejected by the service ends the session (`SessionExpired`).
//! Transport failures keep the session and retry after a short back-off;
//! reconnecting is this client's job, not the session store's.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::IdentityService;
use super::listeners::{ListenerRegistry, Subscription};
use super::refresh::{needs_refresh, refresh_delay};
use super::storage::SessionFile;
use super::types::{AuthChange, IdentityError, Session, SessionEvent, SessionUser, SignUpOutcome, SignUpProfile};
use crate::config::ClientConfig;

const AUTH_PATH: &str = "/auth/v1";
const REFRESH_RETRY_SECS: u64 = 5;
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid login credentials";

// =============================================================================
// CLIENT
// =============================================================================

/// Identity service backed by a hosted Supabase project.
pub struct SupabaseIdentity {
    shared: Arc<Shared>,
    refresher: JoinHandle<()>,
}

struct Shared {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    storage: SessionFile,
    listeners: ListenerRegistry,
    current: Mutex<Current>,
    refresh_margin: time::Duration,
    wake: Notify,
}

/// Current session plus a counter bumped on every change.
#[derive(Default)]
struct Current {
    session: Option<Session>,
    generation: u64,
}

impl SupabaseIdentity {
    /// Build a client from typed config and start its token refresher.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;

        let shared = Arc::new(Shared {
            http,
            base_url: config.supabase_url.clone(),
            anon_key: config.anon_key.clone(),
            storage: SessionFile::new(&config.session_file),
            listeners: ListenerRegistry::new(),
            current: Mutex::new(Current::default()),
            refresh_margin: time::Duration::seconds(i64::try_from(config.refresh_margin_secs).unwrap_or(i64::MAX)),
            wake: Notify::new(),
        });
        let refresher = tokio::spawn(refresh_loop(shared.clone()));
        debug!(base_url = %shared.base_url, session_file = %shared.storage.path().display(), "supabase identity client ready");
        Ok(Self { shared, refresher })
    }

    /// Number of active session-changed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }
}

impl Drop for SupabaseIdentity {
    fn drop(&mut self) {
        self.refresher.abort();
    }
}

impl Shared {
    async fn post_token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, IdentityError> {
        let text = self
            .post(&token_url(&self.base_url, grant_type), &body, None)
            .await?;
        parse_session(&text, OffsetDateTime::now_utc())
    }

    /// POST `body`, returning the response text on 2xx.
    async fn post(&self, url: &str, body: &serde_json::Value, bearer: Option<&str>) -> Result<String, IdentityError> {
        let mut request = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        Ok(text)
    }

    /// Current session and its generation.
    async fn snapshot(&self) -> (Option<Session>, u64) {
        let current = self.current.lock().await;
        (current.session.clone(), current.generation)
    }

    /// Make `session` current without announcing it, unless the session
    /// changed since `generation`.
    async fn adopt_if(&self, generation: u64, session: Session) -> bool {
        let mut current = self.current.lock().await;
        if current.generation != generation {
            return false;
        }
        current.session = Some(session);
        current.generation += 1;
        self.wake.notify_one();
        true
    }

    /// Remove the persisted session unless the session changed since
    /// `generation`.
    async fn clear_stored_if(&self, generation: u64) -> Result<(), IdentityError> {
        let current = self.current.lock().await;
        if current.generation != generation {
            return Ok(());
        }
        self.storage.clear().await
    }

    /// Make `session` current, persist it, and publish `change`.
    async fn install(&self, session: Session, change: AuthChange) {
        let mut current = self.current.lock().await;
        self.replace(&mut current, Some(session), change).await;
    }

    /// Like `install`, but only if the session has not changed since
    /// `generation`.
    async fn install_if(&self, generation: u64, session: Session, change: AuthChange) -> bool {
        let mut current = self.current.lock().await;
        if current.generation != generation {
            debug!(%change, "session changed while request was in flight, dropping result");
            return false;
        }
        self.replace(&mut current, Some(session), change).await;
        true
    }

    /// Drop the current session, remove the persisted copy, and publish `change`.
    async fn discard(&self, change: AuthChange) {
        let mut current = self.current.lock().await;
        self.replace(&mut current, None, change).await;
    }

    /// Like `discard`, but only if the session has not changed since `generation`.
    async fn discard_if(&self, generation: u64, change: AuthChange) -> bool {
        let mut current = self.current.lock().await;
        if current.generation != generation {
            return false;
        }
        self.replace(&mut current, None, change).await;
        true
    }

    /// Write, persist, wake, and emit while the caller holds the session lock.
    async fn replace(&self, current: &mut Current, session: Option<Session>, change: AuthChange) {
        current.session.clone_from(&session);
        current.generation += 1;
        let persisted = match &session {
            Some(session) => self.storage.save(session).await,
            None => self.storage.clear().await,
        };
        if let Err(e) = persisted {
            warn!(error = %e, %change, "failed to update persisted session");
        }
        self.wake.notify_one();
        self.listeners.emit(&SessionEvent { change, session });
    }

    async fn refresh_current(&self) {
        let (session, generation) = self.snapshot().await;
        let Some(session) = session else {
            return;
        };
        let result = self
            .post_token("refresh_token", json!({ "refresh_token": session.refresh_token }))
            .await;
        self.finish_refresh(generation, result).await;
    }

    /// Apply a refresh response for the session current at `generation`.
    async fn finish_refresh(&self, generation: u64, result: Result<Session, IdentityError>) {
        match result {
            Ok(session) => {
                let user_id = session.user.id.clone();
                if self.install_if(generation, session, AuthChange::TokenRefreshed).await {
                    info!(%user_id, "session refreshed");
                }
            }
            Err(IdentityError::Request(e)) => {
                warn!(error = %e, retry_secs = REFRESH_RETRY_SECS, "session refresh failed, retrying");
                tokio::time::sleep(Duration::from_secs(REFRESH_RETRY_SECS)).await;
            }
            Err(e) => {
                if self.discard_if(generation, AuthChange::SessionExpired).await {
                    warn!(error = %e, "session refresh rejected, ending session");
                }
            }
        }
    }
}

async fn refresh_loop(shared: Arc<Shared>) {
    loop {
        let delay = shared
            .current
            .lock()
            .await
            .session
            .as_ref()
            .and_then(|s| refresh_delay(s.expires_at, OffsetDateTime::now_utc(), shared.refresh_margin));

        let Some(delay) = delay else {
            shared.wake.notified().await;
            continue;
        };
        debug!(delay_secs = delay.as_secs(), "session refresh scheduled");

        tokio::select! {
            () = tokio::time::sleep(delay) => shared.refresh_current().await,
            () = shared.wake.notified() => {}
        }
    }
}

#[async_trait::async_trait]
impl IdentityService for SupabaseIdentity {
    async fn fetch_current_session(&self) -> Result<Option<Session>, IdentityError> {
        let shared = &self.shared;
        let (current, generation) = shared.snapshot().await;
        if current.is_some() {
            return Ok(current);
        }

        let stored = match shared.storage.load().await {
            Ok(stored) => stored,
            Err(IdentityError::Parse(e)) => {
                warn!(error = %e, "discarding unreadable session file");
                shared.clear_stored_if(generation).await?;
                None
            }
            Err(e) => return Err(e),
        };
        let Some(stored) = stored else {
            return Ok(None);
        };

        if !needs_refresh(&stored, OffsetDateTime::now_utc(), shared.refresh_margin) {
            if shared.adopt_if(generation, stored.clone()).await {
                debug!(user_id = %stored.user_id(), "restored persisted session");
                return Ok(Some(stored));
            }
            return Ok(shared.snapshot().await.0);
        }

        match shared
            .post_token("refresh_token", json!({ "refresh_token": stored.refresh_token }))
            .await
        {
            Ok(session) => {
                let user_id = session.user.id.clone();
                if shared
                    .install_if(generation, session.clone(), AuthChange::TokenRefreshed)
                    .await
                {
                    info!(%user_id, "persisted session refreshed");
                    return Ok(Some(session));
                }
                Ok(shared.snapshot().await.0)
            }
            Err(e @ IdentityError::Request(_)) => Err(e),
            Err(e) => {
                debug!(error = %e, "persisted session expired");
                shared.clear_stored_if(generation).await?;
                Ok(shared.snapshot().await.0)
            }
        }
    }

    fn on_session_changed(&self) -> Subscription {
        self.shared.listeners.register()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let session = self
            .shared
            .post_token("password", json!({ "email": email, "password": password }))
            .await?;
        info!(user_id = %session.user_id(), "signed in");
        self.shared
            .install(session.clone(), AuthChange::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, IdentityError> {
        let body = json!({ "email": email, "password": password, "data": profile });
        let text = self
            .shared
            .post(&signup_url(&self.shared.base_url), &body, None)
            .await?;
        let outcome = parse_sign_up(&text, OffsetDateTime::now_utc())?;
        if let Some(user) = &outcome.user {
            info!(user_id = %user.id, confirmed = outcome.session.is_some(), "account created");
        }
        if let Some(session) = &outcome.session {
            self.shared
                .install(session.clone(), AuthChange::SignedIn)
                .await;
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let access_token = self
            .shared
            .snapshot()
            .await
            .0
            .map(|s| s.access_token);

        let revoked = match access_token {
            Some(token) => match self
                .shared
                .post(&logout_url(&self.shared.base_url), &json!({}), Some(&token))
                .await
            {
                Err(IdentityError::Response { status: 401 | 403 | 404, .. }) => Ok(()),
                other => other.map(|_| ()),
            },
            None => Ok(()),
        };

        self.shared.discard(AuthChange::SignedOut).await;
        info!("signed out");
        revoked
    }
}

// =============================================================================
// URLS
// =============================================================================

fn token_url(base_url: &str, grant_type: &str) -> String {
    format!("{base_url}{AUTH_PATH}/token?grant_type={grant_type}")
}

fn signup_url(base_url: &str) -> String {
    format!("{base_url}{AUTH_PATH}/signup")
}

fn logout_url(base_url: &str) -> String {
    format!("{base_url}{AUTH_PATH}/logout")
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: WireUser,
}

#[derive(Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: WireUserMetadata,
}

#[derive(Deserialize, Default)]
struct WireUserMetadata {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl From<WireUser> for SessionUser {
    fn from(user: WireUser) -> Self {
        Self { id: user.id, email: user.email, full_name: user.user_metadata.full_name }
    }
}

impl WireSession {
    fn into_session(self, now: OffsetDateTime) -> Session {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .and_then(|secs| i64::try_from(secs).ok())
                .map(|secs| now.unix_timestamp() + secs)
        });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".into()),
            expires_in: self.expires_in,
            expires_at,
            user: self.user.into(),
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a token-endpoint response body into a session.
fn parse_session(text: &str, now: OffsetDateTime) -> Result<Session, IdentityError> {
    let wire: WireSession = serde_json::from_str(text).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(wire.into_session(now))
}

/// Parse a sign-up response. Auto-confirmed projects answer with a session;
/// projects requiring email confirmation answer with the bare user.
fn parse_sign_up(text: &str, now: OffsetDateTime) -> Result<SignUpOutcome, IdentityError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| IdentityError::Parse(e.to_string()))?;
    if value.get("access_token").is_some() {
        let wire: WireSession = serde_json::from_value(value).map_err(|e| IdentityError::Parse(e.to_string()))?;
        let session = wire.into_session(now);
        return Ok(SignUpOutcome { user: Some(session.user.clone()), session: Some(session) });
    }
    let user: WireUser = serde_json::from_value(value).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(SignUpOutcome { user: Some(user.into()), session: None })
}

/// Map a non-2xx response to an error with a user-facing message.
fn parse_error(status: u16, text: &str) -> IdentityError {
    let wire: WireError = serde_json::from_str(text).unwrap_or_default();
    if wire.error_code.as_deref() == Some("invalid_credentials") {
        return IdentityError::InvalidCredentials;
    }
    let message = wire
        .msg
        .or(wire.error_description)
        .or(wire.message)
        .or(wire.error)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    if message == INVALID_CREDENTIALS_MESSAGE {
        return IdentityError::InvalidCredentials;
    }
    IdentityError::Response { status, message }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
