//! spendr - command-line client for the Spendr budget service.
//!
//! Signs in, keeps the session alive across expired access tokens, and
//! prints wallets and the monthly dashboard summary.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spendr_core::auth::Registration;
use spendr_core::{Config, Navigator, Route, Session, Status};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable supplying the login username
const USERNAME_ENV: &str = "SPENDR_USERNAME";

/// Environment variable supplying the login password (skips the prompt)
const PASSWORD_ENV: &str = "SPENDR_PASSWORD";

const LOG_FILE_PREFIX: &str = "spendr.log";

const USAGE: &str = "\
Usage: spendr <command>

Commands:
  login [username]   Sign in and store the session
  register           Create an account
  logout             End the session, locally and on the server
  whoami             Show the signed-in user
  status             Show session status
  wallets            List wallets and balances
  summary            Show this month's dashboard summary as JSON";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when the cache directory is available, to a daily
/// rolling file there. The returned guard flushes the file writer on drop.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = config.cache_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Tells the user which view the session moved to.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        match route {
            Route::Login => eprintln!("Signed out. Run `spendr login` to sign in again."),
            Route::Dashboard => eprintln!("Signed in."),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}. Using defaults.", e);
        Config::default()
    });
    let _guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };

    info!(command, api = %config.api_base_url(), "spendr starting");
    let session = Session::new(&config, Arc::new(TerminalNavigator))
        .context("Failed to set up the API client")?;

    match command {
        "login" => login(&session, &mut config, args.get(1).cloned()).await,
        "register" => register(&session).await,
        "logout" => {
            session.logout().await;
            Ok(())
        }
        "whoami" => match session.initialize().await {
            Some(user) => {
                println!("{} <{}> (id {})", user.display_name(), user.email, user.id);
                Ok(())
            }
            None => bail!("Not signed in. Run `spendr login` first."),
        },
        "status" => {
            session.initialize().await;
            let snap = session.state().snapshot();
            let status = match snap.status {
                Status::Anonymous => "signed out",
                Status::Authenticating => "signing in",
                Status::Authenticated if snap.is_pending_verification() => "signed in (unverified)",
                Status::Authenticated => "signed in",
                Status::Refreshing => "refreshing",
                Status::Expired => "expired",
            };
            println!("Status: {}", status);
            if let Some(user) = snap.user {
                println!("User:   {}", user.display_name());
            }
            Ok(())
        }
        "wallets" => {
            require_session(&session).await?;
            let wallets = session.budget().wallets().await?;
            if wallets.is_empty() {
                println!("No wallets.");
            }
            for wallet in wallets {
                println!("{:<24} {:>16}", wallet.name, wallet.balance_display());
            }
            Ok(())
        }
        "summary" => {
            require_session(&session).await?;
            let summary = session.budget().dashboard_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Restore the stored session, failing if there is none.
async fn require_session(session: &Session) -> Result<()> {
    session.initialize().await;
    if !session.state().status().is_authenticated() {
        bail!("Not signed in. Run `spendr login` first.");
    }
    Ok(())
}

async fn login(session: &Session, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
        Some(name) => name,
        None => prompt("Username", config.last_username.as_deref())?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let user = session.login(&username, &password).await?;
    if let Some(user) = user {
        println!("Welcome, {}.", user.display_name());
    }

    config.last_username = Some(username);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    Ok(())
}

async fn register(session: &Session) -> Result<()> {
    let username = prompt("Username", None)?;
    let email = prompt("Email", None)?;
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let password2 = rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    if password != password2 {
        bail!("Passwords do not match");
    }

    let registration = Registration {
        username,
        email,
        password,
        password2,
    };
    match session.register(&registration).await? {
        Some(user) => println!("Account created. Welcome, {}.", user.display_name()),
        None => println!("Account created. Run `spendr login` to sign in."),
    }
    Ok(())
}

/// Read one line from stdin, falling back to `default` on empty input.
fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => eprint!("{} [{}]: ", label, default),
        None => eprint!("{}: ", label),
    }
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim();
    match (value.is_empty(), default) {
        (false, _) => Ok(value.to_string()),
        (true, Some(default)) => Ok(default.to_string()),
        (true, None) => bail!("{} is required", label),
    }
}
