//! Chalkboard - a terminal client for the classroom blog.
//!
//! Students browse, search and comment on posts; professors also write,
//! edit and delete them. Sessions persist between runs.

mod app;
mod ui;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chalkboard_core::{Config, Route, SessionManager};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "chalkboard.log";

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a daily file in the cache
/// directory. Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = log_dir.and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
            .ok()
    });

    match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::sink))
                .with(filter)
                .init();
            None
        }
    }
}

fn print_usage() {
    eprintln!("Usage: chalkboard [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --open <PATH>   Start at a route, e.g. /post/42 or /admin");
    eprintln!("  --login         Log in from the command line and exit");
    eprintln!("  --logout        Remove the stored session and exit");
    eprintln!("  --whoami        Show the stored session and exit");
    eprintln!("  -h, --help      Show this help");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let _log_guard = init_tracing(config.cache_dir().ok().as_deref());

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    let mut start_route = Route::Home;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--login" => return login_command(&config),
            "--logout" => return logout_command(&config),
            "--whoami" => return whoami_command(&config),
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "--open" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow::anyhow!("--open needs a path"))?;
                start_route =
                    Route::parse(path).ok_or_else(|| anyhow::anyhow!("Unknown path: {}", path))?;
                i += 1;
            }
            other => {
                print_usage();
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    info!(api = %config.api_base_url, "Chalkboard starting");

    // Create app before touching the terminal so config errors print cleanly
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Draw once while the session is still loading, then restore it
    app.navigate(start_route);
    terminal.draw(|f| render(f, &app))?;
    app.restore_session();

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Chalkboard shutting down");
    Ok(())
}

fn session_manager(config: &Config) -> Result<SessionManager> {
    let store = config.credential_store()?;
    let session = SessionManager::new(store);
    session.restore();
    Ok(session)
}

/// Prompt for credentials on the terminal and store a session
fn login_command(config: &Config) -> Result<()> {
    let session = session_manager(config)?;

    let default_user = config.last_username.clone().unwrap_or_default();
    if default_user.is_empty() {
        eprint!("Username: ");
    } else {
        eprint!("Username [{}]: ", default_user);
    }
    io::stderr().flush()?;

    let mut username = String::new();
    io::stdin()
        .lock()
        .read_line(&mut username)
        .context("Failed to read username")?;
    let username = match username.trim() {
        "" => default_user,
        name => name.to_string(),
    };

    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    match session.login(&username, &password) {
        Ok(s) => {
            let mut config = config.clone();
            config.last_username = Some(s.username.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            eprintln!("Logged in as {} ({})", s.display_name, s.role);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e),
    }
}

fn logout_command(config: &Config) -> Result<()> {
    let session = session_manager(config)?;
    session.logout();
    eprintln!("Logged out");
    Ok(())
}

fn whoami_command(config: &Config) -> Result<()> {
    let session = session_manager(config)?;
    match session.current_session() {
        Some(s) => println!("{} ({}, {})", s.display_name, s.username, s.role),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        return Ok(());
                    }

                    // Handle input
                    if handle_input(app, key)? {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
