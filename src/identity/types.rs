//! Identity types: sessions, users, change events and errors.
//!
//! DESIGN
//! ======
//! Token material is carried but never parsed locally. The store only cares
//! whether a session is present and which subject it belongs to; expiry
//! metadata is read by the identity client's refresher and nobody else.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity service operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The HTTP request to the identity service failed.
    #[error("identity request failed: {0}")]
    Request(String),

    /// The identity service rejected the request. `message` is user-facing.
    #[error("{message}")]
    Response { status: u16, message: String },

    /// The identity service response body could not be deserialized.
    #[error("identity response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// Reading or writing the persisted session failed.
    #[error("session storage failed: {0}")]
    Storage(String),

    /// A background identity task ended without a result.
    #[error("identity task failed: {0}")]
    TaskFailed(String),

    /// Email/password pair was not accepted.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// The operation needs a session and none is active.
    #[error("no active session")]
    NotSignedIn,
}

// =============================================================================
// SESSION
// =============================================================================

/// Identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Opaque subject identifier.
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Display name from sign-up profile metadata.
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Proof of authentication issued by the identity service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Lifetime in seconds at issuance.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Expiry as a unix timestamp in seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    /// Subject identifier of the session's user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

// =============================================================================
// CHANGE EVENTS
// =============================================================================

/// Kind of session change pushed by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    SessionExpired,
}

impl AuthChange {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
            Self::UserUpdated => "user_updated",
            Self::SessionExpired => "session_expired",
        }
    }
}

impl fmt::Display for AuthChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One session-changed notification. `session` replaces the previous one
/// wholesale; `None` means signed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub change: AuthChange,
    pub session: Option<Session>,
}

impl SessionEvent {
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self { change: AuthChange::SignedIn, session: Some(session) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { change: AuthChange::SignedOut, session: None }
    }

    #[must_use]
    pub fn token_refreshed(session: Session) -> Self {
        Self { change: AuthChange::TokenRefreshed, session: Some(session) }
    }

    #[must_use]
    pub fn session_expired() -> Self {
        Self { change: AuthChange::SessionExpired, session: None }
    }
}

// =============================================================================
// SIGN-UP
// =============================================================================

/// Profile metadata submitted alongside sign-up credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUpProfile {
    pub full_name: String,
}

/// Result of a sign-up. `session` is absent when the service requires email
/// confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: Option<SessionUser>,
    pub session: Option<Session>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
