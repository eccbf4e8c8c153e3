//! Token refresh scheduling.
//!
//! A session is refreshed `margin` before it expires. Sessions without an
//! expiry are never refreshed; sessions already inside the margin are due now.
//! A margin reaching past the earliest representable time also means due now.

use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};

use super::types::Session;

/// How long to wait before refreshing a session expiring at `expires_at`.
#[must_use]
pub fn refresh_delay(expires_at: Option<i64>, now: OffsetDateTime, margin: Duration) -> Option<StdDuration> {
    let expires_at = OffsetDateTime::from_unix_timestamp(expires_at?).ok()?;
    let Some(due) = expires_at.checked_sub(margin) else {
        return Some(StdDuration::ZERO);
    };
    Some(StdDuration::try_from(due - now).unwrap_or(StdDuration::ZERO))
}

/// Whether `session` should be refreshed before use.
#[must_use]
pub fn needs_refresh(session: &Session, now: OffsetDateTime, margin: Duration) -> bool {
    refresh_delay(session.expires_at, now, margin) == Some(StdDuration::ZERO)
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
