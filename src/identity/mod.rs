//! Identity: the external authentication service seen through one trait.
//!
//! ARCHITECTURE
//! ============
//! `IdentityService` is the seam between the session core and whoever issues
//! sessions. `supabase` talks to the hosted auth API over HTTP; `memory`
//! keeps accounts in-process for tests and offline runs. Both publish
//! session changes through a `ListenerRegistry`.

pub mod listeners;
pub mod memory;
pub mod refresh;
pub mod storage;
pub mod supabase;
pub mod types;

pub use listeners::{ListenerRegistry, Subscription, SubscriptionHandle};
pub use memory::MemoryIdentity;
pub use supabase::SupabaseIdentity;
pub use types::{AuthChange, IdentityError, Session, SessionEvent, SessionUser, SignUpOutcome, SignUpProfile};

// =============================================================================
// IDENTITY SERVICE TRAIT
// =============================================================================

/// Provider-neutral async interface to the identity service.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Restore the currently persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the service or local storage is
    /// unreachable. Callers in the session core treat any error as "no session".
    async fn fetch_current_session(&self) -> Result<Option<Session>, IdentityError>;

    /// Register for every subsequent session change. Dropping or cancelling
    /// the returned subscription releases the registration.
    fn on_session_changed(&self) -> Subscription;

    /// Exchange an email/password pair for a session.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] or a service error.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Create an account with profile metadata.
    ///
    /// # Errors
    ///
    /// Returns a service error (e.g. the email is already registered).
    async fn sign_up(&self, email: &str, password: &str, profile: &SignUpProfile)
    -> Result<SignUpOutcome, IdentityError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the service could not revoke the session. The
    /// local session is cleared regardless.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}
