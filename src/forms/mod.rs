//! Credential forms: field validation and submission against the identity
//! service.
//!
//! SYSTEM CONTEXT
//! ==============
//! The login and registration pages collect credentials here. Submitting
//! never writes auth state directly. A successful sign-in reaches the session
//! store through the identity service's session-changed event.

pub mod login;
pub mod register;
pub mod validate;

pub use login::{LoginErrors, LoginForm, LoginOutcome};
pub use register::{ACCOUNT_CREATED, RegisterErrors, RegisterForm, RegisterOutcome};
