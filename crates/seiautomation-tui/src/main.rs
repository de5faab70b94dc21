//! SEIAutomation - a terminal client for the SEI automation server.
//!
//! Sign in, pick tasks from the catalog, dispatch them with run parameters,
//! and watch recent runs refresh in place.

mod app;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use seiautomation_core::auth::open_token_store;
use seiautomation_core::{ApiClient, AutomationApi, Config, SessionManager};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "seiautomation.log";

const USAGE: &str = "Usage: seiautomation [--whoami | --logout] [--no-persist]

  --whoami      Print the signed-in user and exit
  --logout      Forget the stored session and exit
  --no-persist  Keep the session token in memory only";

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a daily file under the cache
/// directory. Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: PathBuf) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    whoami: bool,
    logout: bool,
    no_persist: bool,
    help: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "--whoami" => cli.whoami = true,
            "--logout" => cli.logout = true,
            "--no-persist" => cli.no_persist = true,
            "-h" | "--help" => cli.help = true,
            other => anyhow::bail!("Unknown argument: {}\n\n{}", other, USAGE),
        }
    }
    Ok(cli)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = parse_args(std::env::args().skip(1))?;
    if cli.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    config.apply_env();
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));

    let _log_guard = init_tracing(cache_dir.join("logs"));
    info!(base_url = %config.api_base_url, "SEIAutomation starting");

    if cli.logout {
        return logout(&config, cache_dir);
    }
    if cli.whoami {
        return whoami(&config, cache_dir).await;
    }

    // Create app before touching the terminal so setup errors print normally
    let mut app = App::new(config, !cli.no_persist)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("SEIAutomation shutting down");
    Ok(())
}

/// Print the user the stored token belongs to.
async fn whoami(config: &Config, cache_dir: PathBuf) -> Result<()> {
    let api: Arc<dyn AutomationApi> =
        Arc::new(ApiClient::new(&config.api_base_url, config.request_timeout())?);
    let mut session = SessionManager::new(api, open_token_store(config.token_store, cache_dir));
    session.initialize().await;

    match session.user() {
        Some(user) => {
            println!("{} <{}>", user.display_name(), user.email);
            if user.is_admin {
                println!("Administrator");
            }
            println!(
                "Automatic credentials: {}",
                if user.allow_auto_credentials { "allowed" } else { "not allowed" }
            );
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

fn logout(config: &Config, cache_dir: PathBuf) -> Result<()> {
    open_token_store(config.token_store, cache_dir).clear()?;
    println!("Signed out.");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    // Draw the loading screen while the stored session is checked
    terminal.draw(|f| render(f, app))?;
    app.start().await;

    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Requests queued by the last key press run after the busy state is shown
        app.run_pending_actions().await;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for session changes and polled runs
        app.check_background_tasks().await;

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults() {
        assert_eq!(parse_args(args(&[])).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_parse_args_flags() {
        let cli = parse_args(args(&["--no-persist", "--whoami"])).unwrap();
        assert!(cli.no_persist);
        assert!(cli.whoami);
        assert!(!cli.logout);
    }

    #[test]
    fn test_parse_args_rejects_unknown() {
        let err = parse_args(args(&["--dump"])).unwrap_err();
        assert!(err.to_string().contains("Unknown argument: --dump"));
    }
}
