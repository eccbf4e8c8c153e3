use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use wealthwise::config::{ClientConfig, ConfigError};
use wealthwise::forms::{LoginErrors, LoginForm, LoginOutcome, RegisterErrors, RegisterForm, RegisterOutcome};
use wealthwise::identity::{IdentityError, IdentityService, MemoryIdentity, SupabaseIdentity};
use wealthwise::router::{HOME_PATH, Navigator, RouteGuard, View};
use wealthwise::rows::{PostgrestClient, RowStoreError};
use wealthwise::state::{AuthState, SessionStore};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Rows(#[from] RowStoreError),
    #[error("{0}")]
    Rejected(String),
    #[error("timed out waiting for the session store")]
    Timeout,
    #[error("session store closed")]
    StoreClosed,
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "wealthwise", about = "WealthWise session and routing client")]
struct Cli {
    /// Seconds to wait for the session store to settle.
    #[arg(long, env = "WEALTHWISE_WAIT_SECS", default_value_t = 10)]
    wait_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Login {
        email: String,
        #[arg(long, env = "WEALTHWISE_PASSWORD")]
        password: String,
    },
    /// Create an account and its opening balance.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        email: String,
        #[arg(long, env = "WEALTHWISE_PASSWORD")]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// End the current session.
    Logout,
    /// Print the restored session's user.
    Whoami,
    /// Resolve a path through the route guard and print the view.
    Open { path: String },
    /// Keep a path open and print every view change until interrupted.
    Watch {
        #[arg(default_value = HOME_PATH)]
        path: String,
    },
    /// Scripted sign-in/sign-out walkthrough against an in-memory identity.
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let wait = Duration::from_secs(cli.wait_secs);

    match cli.command {
        Command::Demo => run_demo(wait).await,
        command => {
            let config = ClientConfig::from_env()?;
            run(command, &config, wait).await
        }
    }
}

async fn run(command: Command, config: &ClientConfig, wait: Duration) -> Result<(), CliError> {
    let identity = Arc::new(SupabaseIdentity::new(config)?);
    info!(url = %config.supabase_url, session_file = %config.session_file.display(), "identity client ready");

    match command {
        Command::Login { email, password } => run_login(identity.as_ref(), email, password).await,
        Command::Register { first_name, last_name, email, password, confirm_password } => {
            let form = RegisterForm {
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                first_name,
                last_name,
                email,
                password,
            };
            let rows = PostgrestClient::new(config)?;
            run_register(identity.as_ref(), &rows, &form).await
        }
        Command::Logout => {
            identity.sign_out().await?;
            println!("signed out");
            Ok(())
        }
        Command::Whoami => run_whoami(identity, wait).await,
        Command::Open { path } => run_open(identity, &path, wait).await,
        Command::Watch { path } => run_watch(identity, &path, wait).await,
        Command::Demo => run_demo(wait).await,
    }
}

// =============================================================================
// CREDENTIAL COMMANDS
// =============================================================================

async fn run_login(identity: &dyn IdentityService, email: String, password: String) -> Result<(), CliError> {
    match LoginForm::new(email, password).submit(identity).await {
        LoginOutcome::SignedIn { redirect_to } => {
            println!("signed in; continue at {redirect_to}");
            Ok(())
        }
        LoginOutcome::Failed(message) => Err(CliError::Rejected(message)),
        LoginOutcome::Invalid(errors) => Err(CliError::Rejected(login_errors(&errors))),
    }
}

async fn run_register(
    identity: &dyn IdentityService,
    rows: &PostgrestClient,
    form: &RegisterForm,
) -> Result<(), CliError> {
    let outcome = form.submit(identity, rows).await;
    let message = outcome.message().unwrap_or_default();
    match outcome {
        RegisterOutcome::Created { .. } => {
            println!("{message}");
            Ok(())
        }
        RegisterOutcome::Invalid(errors) => Err(CliError::Rejected(register_errors(&errors))),
        RegisterOutcome::Failed(_) | RegisterOutcome::BalanceFailed(_) => Err(CliError::Rejected(message)),
    }
}

fn login_errors(errors: &LoginErrors) -> String {
    [errors.email, errors.password].into_iter().flatten().collect::<Vec<_>>().join("; ")
}

fn register_errors(errors: &RegisterErrors) -> String {
    [errors.first_name, errors.last_name, errors.email, errors.password, errors.confirm_password]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// SESSION COMMANDS
// =============================================================================

async fn run_whoami(identity: Arc<dyn IdentityService>, wait: Duration) -> Result<(), CliError> {
    let store = SessionStore::start(identity);
    let mut watch = store.watch();
    let state = tokio::time::timeout(wait, watch.resolved())
        .await
        .map_err(|_| CliError::Timeout)?
        .ok_or(CliError::StoreClosed)?;
    println!("{}", describe_user(&state));
    store.teardown();
    Ok(())
}

async fn run_open(identity: Arc<dyn IdentityService>, path: &str, wait: Duration) -> Result<(), CliError> {
    let store = SessionStore::start(identity);
    let (mut navigator, view) = Navigator::new(RouteGuard::new(store.watch()), path);
    let view = settle(&mut navigator, view, wait).await?;
    println!("{} -> {}", path, describe_view(view, navigator.current_path()));
    store.teardown();
    Ok(())
}

async fn run_watch(identity: Arc<dyn IdentityService>, path: &str, wait: Duration) -> Result<(), CliError> {
    let store = SessionStore::start(identity);
    let (mut navigator, view) = Navigator::new(RouteGuard::new(store.watch()), path);
    let view = settle(&mut navigator, view, wait).await?;
    println!("{}", describe_view(view, navigator.current_path()));

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            next = navigator.follow() => {
                let Some(view) = next else { break };
                println!("{} ({})", describe_view(view, navigator.current_path()), describe_user(&navigator.guard().state()));
            }
        }
    }

    store.teardown();
    Ok(())
}

/// Follow auth changes until the view is no longer `Loading`.
async fn settle(navigator: &mut Navigator, mut view: View, wait: Duration) -> Result<View, CliError> {
    tokio::time::timeout(wait, async move {
        while view == View::Loading {
            view = navigator.follow().await.ok_or(CliError::StoreClosed)?;
        }
        Ok::<_, CliError>(view)
    })
    .await
    .map_err(|_| CliError::Timeout)?
}

fn describe_view(view: View, path: &str) -> String {
    match view {
        View::Loading => "loading".to_owned(),
        View::Page(page) => format!("{} at {path}", page.title()),
        View::NotFound => format!("not found: {path}"),
    }
}

fn describe_user(state: &AuthState) -> String {
    match state.user() {
        Some(user) => {
            let email = user.email.as_deref().unwrap_or("-");
            match user.full_name.as_deref() {
                Some(name) => format!("{name} <{email}> ({})", user.id),
                None => format!("{email} ({})", user.id),
            }
        }
        None => "not signed in".to_owned(),
    }
}

// =============================================================================
// DEMO
// =============================================================================

const DEMO_EMAIL: &str = "demo@wealthwise.app";
const DEMO_PASSWORD: &str = "demo-pass";

async fn run_demo(wait: Duration) -> Result<(), CliError> {
    let identity = Arc::new(MemoryIdentity::new().with_account(DEMO_EMAIL, DEMO_PASSWORD, Some("Demo User")));
    let store = SessionStore::start(identity.clone());
    let mut watch = store.watch();

    let (mut navigator, view) = Navigator::new(RouteGuard::new(store.watch()), HOME_PATH);
    println!("open {HOME_PATH}: {}", describe_view(view, navigator.current_path()));
    let view = settle(&mut navigator, view, wait).await?;
    println!("resolved: {}", describe_view(view, navigator.current_path()));

    run_login(identity.as_ref(), DEMO_EMAIL.to_owned(), DEMO_PASSWORD.to_owned()).await?;
    let state = tokio::time::timeout(wait, watch.wait_until(AuthState::is_authenticated))
        .await
        .map_err(|_| CliError::Timeout)?
        .ok_or(CliError::StoreClosed)?;
    println!("auth: {}", describe_user(&state));

    let view = navigator.open("/transactions");
    println!("open /transactions: {}", describe_view(view, navigator.current_path()));

    identity.sign_out().await?;
    let view = tokio::time::timeout(wait, navigator.follow())
        .await
        .map_err(|_| CliError::Timeout)?
        .ok_or(CliError::StoreClosed)?;
    println!("after sign-out: {}", describe_view(view, navigator.current_path()));

    store.teardown();
    Ok(())
}
