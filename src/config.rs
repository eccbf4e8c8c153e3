//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_SESSION_FILE: &str = ".wealthwise-session.json";
pub const DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_REFRESH_MARGIN_SECS: u64 = 60;
/// Upper bound for `SESSION_REFRESH_MARGIN_SECS`; larger values are clamped.
pub const MAX_SESSION_REFRESH_MARGIN_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid SUPABASE_URL '{0}' (expected http:// or https://)")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Project base URL without trailing slash.
    pub supabase_url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    pub session_file: PathBuf,
    pub timeouts: IdentityTimeouts,
    pub refresh_margin_secs: u64,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `WEALTHWISE_SESSION_FILE`: default `.wealthwise-session.json`
    /// - `IDENTITY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `IDENTITY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SESSION_REFRESH_MARGIN_SECS`: default 60, at most one day
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or empty,
    /// or the URL is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = required("SUPABASE_URL")?;
        let supabase_url = parse_base_url(&raw_url)?;
        let anon_key = required("SUPABASE_ANON_KEY")?;
        let session_file = std::env::var("WEALTHWISE_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);
        let timeouts = IdentityTimeouts {
            request_secs: env_parse("IDENTITY_REQUEST_TIMEOUT_SECS", DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("IDENTITY_CONNECT_TIMEOUT_SECS", DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS),
        };
        let refresh_margin_secs = env_parse("SESSION_REFRESH_MARGIN_SECS", DEFAULT_SESSION_REFRESH_MARGIN_SECS)
            .min(MAX_SESSION_REFRESH_MARGIN_SECS);

        Ok(Self { supabase_url, anon_key, session_file, timeouts, refresh_margin_secs })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    if !(raw.starts_with("https://") || raw.starts_with("http://")) {
        return Err(ConfigError::InvalidUrl(raw.to_owned()));
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
