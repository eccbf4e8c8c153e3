//! Route guard for protected pages.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every protected page applies the same rule: show a loading view until the
//! session store resolves, then either render or send the visitor to the
//! login page. The redirect replaces the history entry so "back" never
//! returns to a page the visitor cannot see.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use crate::state::{AuthState, AuthWatch};

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/login";

/// Navigation instruction issued by the guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Initial fetch still pending. Render a loading indicator.
    Loading,
    Redirect(Redirect),
    /// Render the protected content.
    Allow,
}

/// Decide what a protected page shows for `state`.
#[must_use]
pub fn evaluate(state: &AuthState, login_path: &str) -> GuardDecision {
    if !state.is_resolved() {
        return GuardDecision::Loading;
    }
    if state.is_authenticated() {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(Redirect { to: login_path.to_owned(), replace: true })
    }
}

/// True once auth has resolved and no user is present.
#[must_use]
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    state.is_resolved() && !state.is_authenticated()
}

/// Guard bound to a live session store.
#[derive(Clone, Debug)]
pub struct RouteGuard {
    auth: AuthWatch,
    login_path: String,
}

impl RouteGuard {
    #[must_use]
    pub fn new(auth: AuthWatch) -> Self {
        Self::with_login_path(auth, LOGIN_PATH)
    }

    #[must_use]
    pub fn with_login_path(auth: AuthWatch, login_path: impl Into<String>) -> Self {
        Self { auth, login_path: login_path.into() }
    }

    /// Decision for the latest auth snapshot.
    #[must_use]
    pub fn decision(&self) -> GuardDecision {
        evaluate(&self.auth.current(), &self.login_path)
    }

    /// Like `decision`, but marks the snapshot seen so `next_decision` only
    /// wakes for later changes.
    pub fn observe(&mut self) -> GuardDecision {
        evaluate(&self.auth.latest(), &self.login_path)
    }

    /// Wait for the next auth change and re-evaluate. `None` once the store
    /// is gone.
    pub async fn next_decision(&mut self) -> Option<GuardDecision> {
        let state = self.auth.changed().await?;
        Some(evaluate(&state, &self.login_path))
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.auth.current()
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}
