//! Shared client-side state modules.
//!
//! DESIGN
//! ======
//! State is split by domain so consumers depend on small focused models.
//! Today only `auth` is shared; page data stays with the pages.

pub mod auth;

pub use auth::{AuthState, AuthWatch, SessionStore};
