//! PostgREST client for `/rest/v1/<table>` inserts.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{RowStore, RowStoreError};
use crate::config::ClientConfig;

const REST_PATH: &str = "/rest/v1";

pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl PostgrestClient {
    /// # Errors
    ///
    /// Returns [`RowStoreError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, RowStoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| RowStoreError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.supabase_url.clone(), anon_key: config.anon_key.clone() })
    }
}

#[async_trait::async_trait]
impl RowStore for PostgrestClient {
    async fn insert(&self, table: &str, rows: serde_json::Value, bearer: Option<&str>) -> Result<(), RowStoreError> {
        let response = self
            .http
            .post(table_url(&self.base_url, table))
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
            .json(&rows)
            .send()
            .await
            .map_err(|e| RowStoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            debug!(table, "rows inserted");
            return Ok(());
        }
        let text = response
            .text()
            .await
            .map_err(|e| RowStoreError::Request(e.to_string()))?;
        Err(parse_error(status, &text))
    }
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{base_url}{REST_PATH}/{table}")
}

#[derive(Deserialize, Default)]
struct WireError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

fn parse_error(status: u16, text: &str) -> RowStoreError {
    let wire: WireError = serde_json::from_str(text).unwrap_or_default();
    let message = wire
        .message
        .or(wire.details)
        .unwrap_or_else(|| format!("insert failed with status {status}"));
    RowStoreError::Response { status, message }
}

#[cfg(test)]
#[path = "postgrest_test.rs"]
mod tests;
