use std::sync::Mutex;

use super::*;
use crate::identity::{IdentityError, MemoryIdentity, Session, SignUpOutcome, Subscription};

// =============================================================================
// MOCKS
// =============================================================================

struct Insert {
    table: String,
    rows: serde_json::Value,
    bearer: Option<String>,
}

#[derive(Default)]
struct MockRows {
    inserts: Mutex<Vec<Insert>>,
    reject: Option<String>,
}

impl MockRows {
    fn rejecting(message: &str) -> Self {
        Self { reject: Some(message.to_owned()), ..Self::default() }
    }
}

#[async_trait::async_trait]
impl RowStore for MockRows {
    async fn insert(&self, table: &str, rows: serde_json::Value, bearer: Option<&str>) -> Result<(), RowStoreError> {
        self.inserts.lock().unwrap().push(Insert {
            table: table.to_owned(),
            rows,
            bearer: bearer.map(str::to_owned),
        });
        match &self.reject {
            Some(message) => Err(RowStoreError::Response { status: 403, message: message.clone() }),
            None => Ok(()),
        }
    }
}

/// Identity that accepts sign-up but withholds both user and session, like a
/// service that hides account existence.
struct OpaqueSignUp(MemoryIdentity);

#[async_trait::async_trait]
impl IdentityService for OpaqueSignUp {
    async fn fetch_current_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(None)
    }

    fn on_session_changed(&self) -> Subscription {
        self.0.on_session_changed()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, IdentityError> {
        Err(IdentityError::InvalidCredentials)
    }

    async fn sign_up(&self, _: &str, _: &str, _: &SignUpProfile) -> Result<SignUpOutcome, IdentityError> {
        Ok(SignUpOutcome { user: None, session: None })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}

fn form() -> RegisterForm {
    RegisterForm {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        password: "secret1".into(),
        confirm_password: "secret1".into(),
    }
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_empty_form_flags_every_field() {
    let errors = RegisterForm::default().validate();
    assert_eq!(errors.first_name, Some(validate::FIRST_NAME_REQUIRED));
    assert_eq!(errors.last_name, Some(validate::LAST_NAME_REQUIRED));
    assert_eq!(errors.email, Some(validate::EMAIL_REQUIRED));
    assert_eq!(errors.password, Some(validate::PASSWORD_REQUIRED));
    assert_eq!(errors.confirm_password, Some(validate::CONFIRM_REQUIRED));
}

#[test]
fn validate_mismatched_confirmation() {
    let form = RegisterForm { confirm_password: "secret2".into(), ..form() };
    let errors = form.validate();
    assert_eq!(errors.confirm_password, Some(validate::PASSWORDS_DIFFER));
    assert_eq!(errors.password, None);
}

#[test]
fn profile_joins_names() {
    assert_eq!(form().profile().full_name, "Ada Lovelace");
}

// =============================================================================
// submit
// =============================================================================

#[tokio::test]
async fn invalid_form_touches_nothing() {
    let identity = MemoryIdentity::new();
    let rows = MockRows::default();
    let form = RegisterForm { password: "123".into(), confirm_password: "123".into(), ..form() };

    let outcome = form.submit(&identity, &rows).await;
    assert!(matches!(outcome, RegisterOutcome::Invalid(ref e) if e.password == Some(validate::PASSWORD_TOO_SHORT)));
    assert!(outcome.message().is_none());
    assert!(rows.inserts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn success_creates_account_and_opening_balance() {
    let identity = MemoryIdentity::new();
    let rows = MockRows::default();

    let outcome = form().submit(&identity, &rows).await;
    let RegisterOutcome::Created { user_id: Some(user_id), signed_in: true } = &outcome else {
        panic!("expected created, got {outcome:?}");
    };
    assert_eq!(outcome.message().as_deref(), Some(ACCOUNT_CREATED));

    let session = identity.current_session().unwrap();
    assert_eq!(session.user.full_name.as_deref(), Some("Ada Lovelace"));

    let inserts = rows.inserts.lock().unwrap();
    assert_eq!(inserts.len(), 1);
    assert_eq!(inserts[0].table, "balances");
    assert_eq!(
        inserts[0].rows,
        serde_json::json!([{ "user_id": user_id, "amount": 0, "cash_balance": "cash" }])
    );
    assert_eq!(inserts[0].bearer.as_deref(), Some(session.access_token.as_str()));
}

#[tokio::test]
async fn duplicate_email_reports_service_message() {
    let identity = MemoryIdentity::new().with_account("ada@example.com", "secret1", None);
    let rows = MockRows::default();

    let outcome = form().submit(&identity, &rows).await;
    assert_eq!(outcome, RegisterOutcome::Failed("User already registered".into()));
    assert!(rows.inserts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn balance_failure_is_reported_after_account_creation() {
    let identity = MemoryIdentity::new();
    let rows = MockRows::rejecting("permission denied for table balances");

    let outcome = form().submit(&identity, &rows).await;
    assert_eq!(
        outcome.message().as_deref(),
        Some("User created, but failed to create initial balance: permission denied for table balances")
    );
    assert!(identity.current_session().is_some());
}

#[tokio::test]
async fn missing_user_skips_balance_insert() {
    let identity = OpaqueSignUp(MemoryIdentity::new());
    let rows = MockRows::default();

    let outcome = form().submit(&identity, &rows).await;
    assert_eq!(outcome, RegisterOutcome::Created { user_id: None, signed_in: false });
    assert!(rows.inserts.lock().unwrap().is_empty());
}
