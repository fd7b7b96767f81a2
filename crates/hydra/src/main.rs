//! hydra: terminal multiplexer for long-lived CLI agent sessions.
//!
//! Preflight runs before the terminal is touched: the process must sit
//! inside a git repository and the home directory must be known; failures go
//! to stderr and exit 1. After that the compositor claims the terminal and a
//! current-thread runtime drives the event loop, which owns every piece of
//! mutable state.
//!
//! Logs go to `~/.hydra/hydra.log`; stdout belongs to the compositor.

mod app;
mod chrome;
mod compositor;
mod input;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use hydra_core::{CheckoutManager, HydraConfig, SessionManager};

use crate::compositor::{Compositor, ViewportGeometry};

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("HYDRA_LOG_LEVEL"))
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

fn init_logging(hydra_dir: &Path) {
    let _ = std::fs::create_dir_all(hydra_dir);
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(hydra_dir.join("hydra.log"))
    else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hydra: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Preflight, before raw mode or any escape output.
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let repo_root = hydra_core::git::repo_root(&cwd).await?;
    let home = dirs::home_dir().context("home directory unknown")?;

    let hydra_dir = home.join(".hydra");
    init_logging(&hydra_dir);
    let config = HydraConfig::load(&hydra_dir.join("config.yaml"));
    info!(repo = %repo_root.display(), command = %config.command, "hydra starting");

    let (cols, rows) = crossterm::terminal::size().context("cannot query terminal size")?;
    let geometry = ViewportGeometry::new(cols, rows);

    let (pty_tx, pty_rx) = mpsc::unbounded_channel();
    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();

    let checkouts = CheckoutManager::new(repo_root, &home);
    let sessions = SessionManager::new(checkouts, config.spawn_spec(), pty_tx);

    let mut compositor = Compositor::stdout(geometry);
    compositor.initialize();
    let stdin = input::StdinReader::start(stdin_tx)?;

    let mut app = app::App::new(sessions, compositor, stdin, pty_rx, stdin_rx, geometry);
    app.run().await
}
