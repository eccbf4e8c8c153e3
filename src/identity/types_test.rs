use super::*;

fn sample_session() -> Session {
    Session {
        access_token: "access-secret".into(),
        refresh_token: "refresh-secret".into(),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at: Some(1_700_000_000),
        user: SessionUser { id: "u1".into(), email: Some("a@b.co".into()), full_name: None },
    }
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn session_user_id_reads_subject() {
    assert_eq!(sample_session().user_id(), "u1");
}

#[test]
fn session_debug_redacts_tokens() {
    let rendered = format!("{:?}", sample_session());
    assert!(!rendered.contains("access-secret"));
    assert!(!rendered.contains("refresh-secret"));
    assert!(rendered.contains("<redacted>"));
    assert!(rendered.contains("u1"));
}

#[test]
fn session_deserializes_without_optional_metadata() {
    let json = serde_json::json!({
        "access_token": "a",
        "refresh_token": "r",
        "token_type": "bearer",
        "user": { "id": "u2" }
    });
    let session: Session = serde_json::from_value(json).unwrap();
    assert_eq!(session.expires_at, None);
    assert_eq!(session.user.email, None);
    assert_eq!(session.user_id(), "u2");
}

// =============================================================================
// SessionEvent
// =============================================================================

#[test]
fn signed_out_event_carries_no_session() {
    let event = SessionEvent::signed_out();
    assert_eq!(event.change, AuthChange::SignedOut);
    assert!(event.session.is_none());
}

#[test]
fn token_refreshed_event_carries_session() {
    let event = SessionEvent::token_refreshed(sample_session());
    assert_eq!(event.change, AuthChange::TokenRefreshed);
    assert_eq!(event.session.as_ref().map(Session::user_id), Some("u1"));
}

#[test]
fn auth_change_display_is_snake_case() {
    assert_eq!(AuthChange::SessionExpired.to_string(), "session_expired");
    assert_eq!(AuthChange::SignedIn.to_string(), "signed_in");
}

// =============================================================================
// IdentityError
// =============================================================================

#[test]
fn response_error_displays_message_verbatim() {
    let err = IdentityError::Response { status: 422, message: "User already registered".into() };
    assert_eq!(err.to_string(), "User already registered");
}

#[test]
fn invalid_credentials_message_matches_service_wording() {
    assert_eq!(IdentityError::InvalidCredentials.to_string(), "Invalid login credentials");
}
