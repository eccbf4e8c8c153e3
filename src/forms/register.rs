//! Account registration form.
//!
//! DESIGN
//! ======
//! Submission is two writes to two services: create the account, then insert
//! the user's opening balance row. The second write can fail after the first
//! succeeded. That case is reported as its own outcome so the page can tell
//! the user the account exists.

#[cfg(test)]
#[path = "register_test.rs"]
mod register_test;

use tracing::{info, warn};

use super::validate;
use crate::identity::{IdentityService, SignUpProfile};
use crate::rows::{BALANCES_TABLE, BalanceRow, RowStore, RowStoreError};

pub const ACCOUNT_CREATED: &str = "Account created successfully!";
const BALANCE_FAILED_PREFIX: &str = "User created, but failed to create initial balance: ";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterErrors {
    pub first_name: Option<&'static str>,
    pub last_name: Option<&'static str>,
    pub email: Option<&'static str>,
    pub password: Option<&'static str>,
    pub confirm_password: Option<&'static str>,
}

impl RegisterErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.confirm_password.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Invalid(RegisterErrors),
    /// Sign-up was refused; message comes from the identity service.
    Failed(String),
    /// Account exists but the opening balance row was not written.
    BalanceFailed(String),
    Created {
        user_id: Option<String>,
        /// The service started a session immediately (no email confirmation).
        signed_in: bool,
    },
}

impl RegisterOutcome {
    /// Message shown under the form, if any.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Invalid(_) => None,
            Self::Failed(message) => Some(message.clone()),
            Self::BalanceFailed(detail) => Some(format!("{BALANCE_FAILED_PREFIX}{detail}")),
            Self::Created { .. } => Some(ACCOUNT_CREATED.to_owned()),
        }
    }
}

impl RegisterForm {
    #[must_use]
    pub fn validate(&self) -> RegisterErrors {
        RegisterErrors {
            first_name: validate::first_name(&self.first_name),
            last_name: validate::last_name(&self.last_name),
            email: validate::email(&self.email),
            password: validate::new_password(&self.password),
            confirm_password: validate::confirm_password(&self.password, &self.confirm_password),
        }
    }

    /// Profile metadata attached to the new account.
    #[must_use]
    pub fn profile(&self) -> SignUpProfile {
        SignUpProfile { full_name: format!("{} {}", self.first_name, self.last_name) }
    }

    pub async fn submit(&self, identity: &dyn IdentityService, rows: &dyn RowStore) -> RegisterOutcome {
        let errors = self.validate();
        if !errors.is_empty() {
            return RegisterOutcome::Invalid(errors);
        }

        let outcome = match identity.sign_up(&self.email, &self.password, &self.profile()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "sign-up failed");
                return RegisterOutcome::Failed(e.to_string());
            }
        };

        let signed_in = outcome.session.is_some();
        let Some(user) = outcome.user else {
            info!("sign-up accepted without a user record");
            return RegisterOutcome::Created { user_id: None, signed_in };
        };

        let bearer = outcome.session.as_ref().map(|s| s.access_token.as_str());
        if let Err(e) = insert_opening_balance(rows, &user.id, bearer).await {
            warn!(user_id = %user.id, error = %e, "opening balance insert failed");
            return RegisterOutcome::BalanceFailed(e.to_string());
        }

        info!(user_id = %user.id, signed_in, "account created");
        RegisterOutcome::Created { user_id: Some(user.id), signed_in }
    }
}

async fn insert_opening_balance(rows: &dyn RowStore, user_id: &str, bearer: Option<&str>) -> Result<(), RowStoreError> {
    let payload =
        serde_json::to_value([BalanceRow::opening(user_id)]).map_err(|e| RowStoreError::Encode(e.to_string()))?;
    rows.insert(BALANCES_TABLE, payload, bearer).await
}
