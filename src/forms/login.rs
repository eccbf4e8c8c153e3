//! Email + password sign-in form.

#[cfg(test)]
#[path = "login_test.rs"]
mod login_test;

use tracing::{debug, warn};

use super::validate;
use crate::identity::IdentityService;
use crate::router::HOME_PATH;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Per-field validation messages. Empty when the form may be submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginErrors {
    pub email: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl LoginErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Validation failed; nothing was sent.
    Invalid(LoginErrors),
    /// The identity service refused; message is shown to the user.
    Failed(String),
    SignedIn { redirect_to: String },
}

impl LoginForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    #[must_use]
    pub fn validate(&self) -> LoginErrors {
        LoginErrors { email: validate::email(&self.email), password: validate::login_password(&self.password) }
    }

    /// Validate and sign in. Auth state follows from the identity service's
    /// session-changed event, not from this call.
    pub async fn submit(&self, identity: &dyn IdentityService) -> LoginOutcome {
        let errors = self.validate();
        if !errors.is_empty() {
            return LoginOutcome::Invalid(errors);
        }

        match identity.sign_in(&self.email, &self.password).await {
            Ok(session) => {
                debug!(user_id = %session.user.id, "login form submitted");
                LoginOutcome::SignedIn { redirect_to: HOME_PATH.to_owned() }
            }
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                LoginOutcome::Failed(e.to_string())
            }
        }
    }
}
