mod tui;

use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use recipe_browser::access::AccessGate;
use recipe_browser::availability::{AvailabilityMonitor, AvailabilityRunner};
use recipe_browser::catalog::RecipeSource;
use recipe_browser::clock::{Clock, SystemClock};
use recipe_browser::config::{Config, STORE_POLL_MS};
use recipe_browser::error::Result;
use recipe_browser::remote::{BackendClient, HealthProber};
use recipe_browser::store::FileStore;

use crate::tui::app::App;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // The terminal belongs to the UI, so logs go to a file.
    if let Err(e) = init_logging(&cfg) {
        eprintln!("Cannot open log file {}: {e}", cfg.log_file.display());
        std::process::exit(1);
    }

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        eprintln!("Fatal error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(cfg: &Config) -> io::Result<()> {
    if let Some(parent) = cfg.log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&cfg.log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        backend = cfg.api_url.as_deref().unwrap_or("<none>"),
        state_dir = %cfg.state_dir.display(),
        gate = cfg.access_secret.is_some(),
        "starting recipe browser"
    );

    // --- Shared store (one directory = one "browser") ---
    let store = FileStore::open(&cfg.state_dir)?;
    let watcher = store.spawn_watcher(Duration::from_millis(STORE_POLL_MS));

    // --- Backend + availability ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = BackendClient::new(cfg.api_url.clone())?;
    let prober = HealthProber::new(Arc::clone(&client), Arc::clone(&clock));
    let monitor = AvailabilityMonitor::new(store.clone(), Arc::clone(&clock));
    let mut updates = monitor.subscribe();
    let runner = AvailabilityRunner::new(Arc::clone(&monitor), Arc::clone(&prober), cfg.timings).spawn();

    // --- Data + access ---
    let access = AccessGate::new(cfg.access_secret.as_deref(), store.clone(), Arc::clone(&clock));
    let source = RecipeSource::with_access(client, Arc::clone(&access));

    let mut app = App::new(source, monitor, access, prober);
    app.reload().await;

    // --- Terminal ---
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = tui::run_loop(&mut terminal, &mut app, &mut updates).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runner.shutdown().await;
    watcher.abort();
    info!("recipe browser stopped");
    result.map_err(Into::into)
}
