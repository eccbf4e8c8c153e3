//! WealthWise client core: session state, route guarding, and the credential
//! flows of the personal-finance client.
//!
//! ARCHITECTURE
//! ============
//! - `identity`: the external auth service behind one async trait, with a
//!   Supabase HTTP implementation and an in-memory one.
//! - `state`: the `SessionStore`, the single writer of `AuthState`.
//! - `router`: route table, history, and the guard protecting finance pages.
//! - `forms`: login and registration validation and submission.
//! - `rows`: row-store inserts (the opening balance written on sign-up).
//! - `config`: environment-driven client configuration.

pub mod config;
pub mod forms;
pub mod identity;
pub mod router;
pub mod rows;
pub mod state;
