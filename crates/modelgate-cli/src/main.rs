//! Modelgate - terminal client for the predictive-modeling service.
//!
//! Drives the session core from the command line: log in and out, check
//! who is logged in, and try routes or API paths against the guard.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use modelgate_core::models::{NewUser, Role};
use modelgate_core::notify::{Notice, Notifier, TracingNotifier};
use modelgate_core::router::Navigation;
use modelgate_core::{config::Config, App};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the login password for non-interactive use
const ENV_PASSWORD: &str = "MODELGATE_PASSWORD";

/// Environment variable naming a directory for rolling log files
const ENV_LOG_DIR: &str = "MODELGATE_LOG_DIR";

const USAGE: &str = "\
Usage: modelgate [--log-dir <dir>] <command>

Commands:
  login [username]                   Log in (password from prompt or MODELGATE_PASSWORD)
  logout                             End the current session
  whoami                             Show the current session
  register <username> <email> <name> Create an account
  register-admin <username> <email> <name> <role>
                                     Create an account with a role (admins only)
  open <path>                        Navigate to a route and report the guard's decision
  get <path>                         Authenticated GET against the API, printed as JSON
  routes                             List the route table";

/// Logs notices and prints them to the terminal
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        TracingNotifier.notify(notice);
        let prefix = match notice {
            Notice::SessionExpired => "⚠️ ",
            Notice::AccessDenied => "❌",
        };
        eprintln!("{} {}", prefix, notice.message());
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "modelgate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
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

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let log_dir = take_flag(&mut args, "--log-dir")
        .or_else(|| std::env::var(ENV_LOG_DIR).ok())
        .map(PathBuf::from);
    let _guard = init_tracing(log_dir);

    let config = Config::load().context("Failed to load configuration")?;
    let app = App::new(config, Arc::new(TerminalNotifier))?;
    info!(base_url = %app.config.api_base_url, "Modelgate starting");

    let Some(command) = args.first().cloned() else {
        println!("{}", USAGE);
        return Ok(());
    };

    match (command.as_str(), &args[1..]) {
        ("login", rest) => login(&app, rest.first().cloned()).await,
        ("logout", _) => {
            if app.logout() {
                println!("Logged out.");
            } else {
                println!("Not logged in.");
            }
            Ok(())
        }
        ("whoami", _) => {
            match app.session.current_user() {
                Some(user) => println!("{} ({}, role: {})", user.display_name(), user.username, user.role),
                None => println!("Not logged in."),
            }
            Ok(())
        }
        ("register", [username, email, name]) => {
            let payload = new_user(username, email, name, Role::User)?;
            let created = app.register(&payload).await.map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{}", created.message);
            Ok(())
        }
        ("register-admin", [username, email, name, role]) => {
            let payload = new_user(username, email, name, Role::from(role.as_str()))?;
            let created = app.register_admin(&payload).await?;
            println!("{}", created.message);
            Ok(())
        }
        ("open", [path]) => {
            match app.navigate(path)? {
                Navigation::Allowed(route) => println!("→ {}", route),
                Navigation::Redirected { requested, to, .. } => {
                    println!("→ {} (redirected from {})", to, requested)
                }
            }
            Ok(())
        }
        ("get", [path]) => match app.api.get::<serde_json::Value>(path).await {
            Ok(body) => {
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                anyhow::bail!("{} requires a valid session; run `modelgate login`", path)
            }
            Err(e) => Err(e.into()),
        },
        ("routes", _) => {
            for route in app.navigator.routes().routes() {
                let access = match (route.meta.requires_auth, route.meta.requires_admin) {
                    (_, true) => "admin",
                    (true, false) => "auth",
                    (false, false) => "public",
                };
                println!("{:<12} {:<16} {}", route.path, route.name, access);
            }
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            anyhow::bail!("Unknown command: {}", args.join(" "))
        }
    }
}

async fn login(app: &App, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    println!("Authenticating...");
    match app.login(&username, &password).await {
        Ok(user) => {
            println!("Welcome, {}!", user.display_name());
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

fn new_user(username: &str, email: &str, name: &str, role: Role) -> Result<NewUser> {
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Choose a password: ")?,
    };
    Ok(NewUser {
        username: username.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        password,
        role,
    })
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Remove `--flag value` from `args`, returning the value
fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    if pos + 1 >= args.len() {
        args.remove(pos);
        return None;
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}
