use super::*;
use crate::config::IdentityTimeouts;
use crate::state::SessionStore;
use uuid::Uuid;

fn now() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
}

fn session_body(expires_at: Option<i64>) -> String {
    let mut body = serde_json::json!({
        "access_token": "eyJ.access",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-1",
        "user": {
            "id": "5b2c0c1e-0000-4000-8000-000000000001",
            "aud": "authenticated",
            "email": "alice@example.com",
            "user_metadata": { "full_name": "Alice Doe" }
        }
    });
    if let Some(at) = expires_at {
        body["expires_at"] = serde_json::json!(at);
    }
    body.to_string()
}

// =============================================================================
// urls
// =============================================================================

#[test]
fn token_url_carries_grant_type() {
    assert_eq!(
        token_url("https://abc.supabase.co", "password"),
        "https://abc.supabase.co/auth/v1/token?grant_type=password"
    );
}

#[test]
fn signup_and_logout_urls() {
    assert_eq!(signup_url("http://localhost:54321"), "http://localhost:54321/auth/v1/signup");
    assert_eq!(logout_url("http://localhost:54321"), "http://localhost:54321/auth/v1/logout");
}

// =============================================================================
// parse_session
// =============================================================================

#[test]
fn parse_session_maps_user_and_metadata() {
    let session = parse_session(&session_body(Some(1_700_003_600)), now()).unwrap();
    assert_eq!(session.access_token, "eyJ.access");
    assert_eq!(session.refresh_token, "refresh-1");
    assert_eq!(session.user_id(), "5b2c0c1e-0000-4000-8000-000000000001");
    assert_eq!(session.user.email.as_deref(), Some("alice@example.com"));
    assert_eq!(session.user.full_name.as_deref(), Some("Alice Doe"));
    assert_eq!(session.expires_at, Some(1_700_003_600));
}

#[test]
fn parse_session_derives_expiry_from_lifetime() {
    let session = parse_session(&session_body(None), now()).unwrap();
    assert_eq!(session.expires_at, Some(1_700_003_600));
    assert_eq!(session.expires_in, Some(3600));
}

#[test]
fn parse_session_rejects_missing_tokens() {
    let err = parse_session(r#"{"user":{"id":"u1"}}"#, now()).unwrap_err();
    assert!(matches!(err, IdentityError::Parse(_)));
}

// =============================================================================
// parse_sign_up
// =============================================================================

#[test]
fn parse_sign_up_with_session() {
    let outcome = parse_sign_up(&session_body(Some(1_700_003_600)), now()).unwrap();
    assert!(outcome.session.is_some());
    assert_eq!(outcome.user.unwrap().full_name.as_deref(), Some("Alice Doe"));
}

#[test]
fn parse_sign_up_pending_confirmation() {
    let body = serde_json::json!({
        "id": "u-new",
        "email": "new@example.com",
        "confirmation_sent_at": "2024-01-01T00:00:00Z",
        "user_metadata": { "full_name": "New User" }
    })
    .to_string();
    let outcome = parse_sign_up(&body, now()).unwrap();
    assert!(outcome.session.is_none());
    let user = outcome.user.unwrap();
    assert_eq!(user.id, "u-new");
    assert_eq!(user.full_name.as_deref(), Some("New User"));
}

#[test]
fn parse_sign_up_garbage_is_parse_error() {
    assert!(matches!(parse_sign_up("not json", now()), Err(IdentityError::Parse(_))));
}

// =============================================================================
// parse_error
// =============================================================================

#[test]
fn parse_error_invalid_grant_is_invalid_credentials() {
    let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
    assert!(matches!(parse_error(400, body), IdentityError::InvalidCredentials));
}

#[test]
fn parse_error_error_code_is_invalid_credentials() {
    let body = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
    assert!(matches!(parse_error(400, body), IdentityError::InvalidCredentials));
}

#[test]
fn parse_error_prefers_msg() {
    let body = r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#;
    let err = parse_error(422, body);
    assert!(matches!(&err, IdentityError::Response { status: 422, message } if message == "User already registered"));
}

#[test]
fn parse_error_non_json_body_uses_status() {
    let err = parse_error(502, "<html>bad gateway</html>");
    assert_eq!(err.to_string(), "request failed with status 502");
}

// =============================================================================
// session lifecycle (no network)
// =============================================================================

/// Config pointing at a closed local port and a fresh temp session file.
fn offline_config(refresh_margin_secs: u64) -> ClientConfig {
    let dir = std::env::temp_dir().join(format!("wealthwise-supabase-{}", Uuid::new_v4()));
    ClientConfig {
        supabase_url: "http://127.0.0.1:9".into(),
        anon_key: "anon".into(),
        session_file: dir.join("session.json"),
        timeouts: IdentityTimeouts { request_secs: 2, connect_secs: 1 },
        refresh_margin_secs,
    }
}

fn session_for(user_id: &str, refresh_token: &str, expires_at: Option<i64>) -> Session {
    Session {
        access_token: format!("access-{refresh_token}"),
        refresh_token: refresh_token.into(),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at,
        user: SessionUser { id: user_id.into(), email: None, full_name: None },
    }
}

fn in_an_hour() -> Option<i64> {
    Some(OffsetDateTime::now_utc().unix_timestamp() + 3600)
}

async fn next_event(sub: &mut Subscription) -> SessionEvent {
    tokio::time::timeout(Duration::from_millis(200), sub.recv())
        .await
        .expect("event receive timed out")
        .expect("subscription closed")
}

async fn assert_no_event(sub: &mut Subscription) {
    let next = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
    assert!(next.is_err(), "unexpected event: {next:?}");
}

#[tokio::test]
async fn fetch_without_session_file_is_none() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    assert_eq!(identity.fetch_current_session().await.unwrap(), None);
}

#[tokio::test]
async fn fetch_adopts_session_outside_refresh_margin() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    let stored = session_for("u1", "rt-1", in_an_hour());
    identity.shared.storage.save(&stored).await.unwrap();
    let mut sub = identity.on_session_changed();

    assert_eq!(identity.fetch_current_session().await.unwrap(), Some(stored.clone()));
    assert_eq!(identity.shared.snapshot().await.0, Some(stored.clone()));
    assert_eq!(identity.shared.storage.load().await.unwrap(), Some(stored));
    assert_no_event(&mut sub).await;

    identity.shared.storage.clear().await.unwrap();
}

#[tokio::test]
async fn fetch_adopts_session_without_expiry() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    let stored = session_for("u1", "rt-1", None);
    identity.shared.storage.save(&stored).await.unwrap();

    assert_eq!(identity.fetch_current_session().await.unwrap(), Some(stored));

    identity.shared.storage.clear().await.unwrap();
}

#[tokio::test]
async fn fetch_clears_unreadable_session_file() {
    let config = offline_config(60);
    let identity = SupabaseIdentity::new(&config).unwrap();
    let parent = config.session_file.parent().unwrap();
    tokio::fs::create_dir_all(parent).await.unwrap();
    tokio::fs::write(&config.session_file, "{ not a session").await.unwrap();

    assert_eq!(identity.fetch_current_session().await.unwrap(), None);
    assert!(!config.session_file.exists());
}

#[tokio::test]
async fn fetch_with_oversized_margin_attempts_refresh_instead_of_panicking() {
    let identity = SupabaseIdentity::new(&offline_config(400_000_000_000)).unwrap();
    identity.shared.storage.save(&session_for("u1", "rt-1", in_an_hour())).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), identity.fetch_current_session())
        .await
        .expect("fetch hung");
    assert!(matches!(result, Err(IdentityError::Request(_))), "got {result:?}");

    identity.shared.storage.clear().await.unwrap();
}

#[tokio::test]
async fn store_resolves_with_oversized_margin() {
    let config = offline_config(400_000_000_000);
    let identity = SupabaseIdentity::new(&config).unwrap();
    identity.shared.storage.save(&session_for("u1", "rt-1", in_an_hour())).await.unwrap();

    let store = SessionStore::start(Arc::new(identity));
    let mut watch = store.watch();
    let state = tokio::time::timeout(Duration::from_secs(5), watch.resolved())
        .await
        .expect("store never resolved")
        .unwrap();
    assert!(state.user().is_none());

    store.teardown();
    SessionFile::new(&config.session_file).clear().await.unwrap();
}

// =============================================================================
// refresh races
// =============================================================================

#[tokio::test]
async fn refresh_for_current_session_is_installed() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    let shared = &identity.shared;
    shared.install(session_for("u1", "rt-1", in_an_hour()), AuthChange::SignedIn).await;
    let mut sub = identity.on_session_changed();
    let (_, generation) = shared.snapshot().await;

    let refreshed = session_for("u1", "rt-2", in_an_hour());
    shared.finish_refresh(generation, Ok(refreshed.clone())).await;

    assert_eq!(shared.snapshot().await.0, Some(refreshed.clone()));
    assert_eq!(shared.storage.load().await.unwrap(), Some(refreshed.clone()));
    let event = next_event(&mut sub).await;
    assert_eq!(event.change, AuthChange::TokenRefreshed);
    assert_eq!(event.session, Some(refreshed));

    shared.storage.clear().await.unwrap();
}

#[tokio::test]
async fn refresh_landing_after_sign_out_is_dropped() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    let shared = &identity.shared;
    shared.install(session_for("u1", "rt-1", in_an_hour()), AuthChange::SignedIn).await;
    let mut sub = identity.on_session_changed();
    let (_, generation) = shared.snapshot().await;

    shared.discard(AuthChange::SignedOut).await;
    shared.finish_refresh(generation, Ok(session_for("u1", "rt-2", in_an_hour()))).await;

    assert_eq!(shared.snapshot().await.0, None);
    assert_eq!(shared.storage.load().await.unwrap(), None);
    assert_eq!(next_event(&mut sub).await.change, AuthChange::SignedOut);
    assert_no_event(&mut sub).await;
}

#[tokio::test]
async fn refresh_does_not_overwrite_newer_sign_in() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    let shared = &identity.shared;
    shared.install(session_for("alice", "rt-a", in_an_hour()), AuthChange::SignedIn).await;
    let (_, generation) = shared.snapshot().await;

    let bob = session_for("bob", "rt-b", in_an_hour());
    shared.install(bob.clone(), AuthChange::SignedIn).await;
    shared.finish_refresh(generation, Ok(session_for("alice", "rt-a2", in_an_hour()))).await;
    assert_eq!(shared.snapshot().await.0, Some(bob.clone()));

    let rejected = IdentityError::Response { status: 400, message: "Invalid Refresh Token".into() };
    shared.finish_refresh(generation, Err(rejected)).await;
    assert_eq!(shared.snapshot().await.0, Some(bob.clone()));
    assert_eq!(shared.storage.load().await.unwrap(), Some(bob));

    shared.storage.clear().await.unwrap();
}

#[tokio::test]
async fn concurrent_installs_emit_in_write_order() {
    let identity = SupabaseIdentity::new(&offline_config(60)).unwrap();
    let shared = identity.shared.clone();
    let mut sub = identity.on_session_changed();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let shared = shared.clone();
            tokio::spawn(async move {
                shared.install(session_for(&format!("u{i}"), &format!("rt-{i}"), in_an_hour()), AuthChange::SignedIn).await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let mut last = None;
    for _ in 0..8 {
        last = next_event(&mut sub).await.session;
    }
    assert_eq!(last, shared.snapshot().await.0);

    shared.storage.clear().await.unwrap();
}
