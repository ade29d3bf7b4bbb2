//! Asset Wizard Entry Point
//!
//! Usage:
//!   asset-wizard [OPTIONS]
//!
//! Options:
//!   --config <PATH>        Config file (default: ~/.config/asset-wizard/wizard.toml)
//!   --socket <PATH>        Worker socket
//!   --log-flush-ms <MS>    Log debounce interval
//!   --log-file <PATH>      Where diagnostics go
//!   --log-level <LEVEL>    Diagnostic level (default: info)

use std::io::{self, IsTerminal};
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use asset_wizard::{App, WizardClient};
use asset_wizard_core::{default_config_path, load_config_from_path, logging, ConfigOverrides};

/// Terminal wizard for extracting game resources into a bundle
#[derive(Parser, Debug)]
#[command(name = "asset-wizard", version, about)]
struct Args {
    /// Config file path
    #[arg(long, env = "ASSET_WIZARD_CONFIG")]
    config: Option<PathBuf>,

    /// Worker socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log debounce interval in milliseconds
    #[arg(long)]
    log_flush_ms: Option<u64>,

    /// Worker connect timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Diagnostic log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Diagnostic log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging goes to a file; the terminal belongs to the UI
    let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    logging::init(&log_path, &args.log_level)?;

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: asset-wizard requires a terminal (TTY)");
        eprintln!();
        eprintln!("Run it interactively, or with ssh -t when remote.");
        std::process::exit(1);
    }

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("loading configuration")?;
    let mut overrides = ConfigOverrides::new();
    if let Some(path) = args.socket.clone() {
        overrides = overrides.with_socket_path(path);
    }
    if let Some(ms) = args.log_flush_ms {
        overrides = overrides.with_log_flush_ms(ms);
    }
    if let Some(ms) = args.connect_timeout_ms {
        overrides = overrides.with_connect_timeout_ms(ms);
    }
    overrides.apply(&mut config).context("applying command-line options")?;
    tracing::info!(source = %config.source(), log = %log_path.display(), "Configuration loaded");

    // Connect before taking over the screen so errors print normally
    let client = WizardClient::connect(&config).await?;

    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(client, config.events.completion_threshold);
    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let shutdown = app.into_client().shutdown().await;
    result?;
    shutdown
}
