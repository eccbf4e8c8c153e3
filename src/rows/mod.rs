//! Row store: inserts into the hosted row-based data store.
//!
//! SYSTEM CONTEXT
//! ==============
//! Only registration writes rows today (the opening balance). Reads belong to
//! the dashboard and transaction pages, which are outside this crate.

pub mod postgrest;

use serde::Serialize;

pub use postgrest::PostgrestClient;

/// Table holding one opening balance per user.
pub const BALANCES_TABLE: &str = "balances";

#[derive(Debug, thiserror::Error)]
pub enum RowStoreError {
    #[error("row store request failed: {0}")]
    Request(String),
    #[error("{message}")]
    Response { status: u16, message: String },
    #[error("row encoding failed: {0}")]
    Encode(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Opening balance created for every new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRow {
    pub user_id: String,
    pub amount: i64,
    pub cash_balance: String,
}

impl BalanceRow {
    #[must_use]
    pub fn opening(user_id: &str) -> Self {
        Self { user_id: user_id.to_owned(), amount: 0, cash_balance: "cash".into() }
    }
}

/// Async insert interface. Enables mocking in tests.
#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    /// Insert `rows` (a JSON array) into `table`, authorized by `bearer` when given.
    ///
    /// # Errors
    ///
    /// Returns a [`RowStoreError`] if the request fails or is rejected.
    async fn insert(&self, table: &str, rows: serde_json::Value, bearer: Option<&str>) -> Result<(), RowStoreError>;
}
