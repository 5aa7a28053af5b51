//! mathpad - Terminal Math Notepad
//!
//! Type calculations line by line and see every result update as you type.
//! Supports variables, units, dates, user functions and live currency rates.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use tracing::{info, warn};

use mathpad::application::{App, MathDocument};
use mathpad::domain::{Engine, Formatter};
use mathpad::infrastructure::{
    CachedRateProvider, Config, FileRepository, HttpRateProvider, LogTarget, init_logging,
    spawn_currency_loader,
};
use mathpad::presentation::{InputHandler, render_ui};

/// How often the event loop wakes up to pick up background results.
const TICK: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "mathpad", version, about = "Terminal math notepad")]
struct Cli {
    /// Document to open
    file: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Do not fetch currency exchange rates
    #[arg(long, global = true)]
    offline: bool,

    /// Override the exchange-rate endpoint
    #[arg(long, global = true)]
    rates_url: Option<String>,

    /// Write logs to this file while the editor is open
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a document and print each line with its result
    Print {
        /// Document to evaluate
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Print { ref file }) => {
            init_logging(LogTarget::Stderr)?;
            let (engine, config, loader) = setup(&cli)?;
            print_document(engine, config, loader, file)
        }
        None => {
            init_logging(cli.log_file.clone().map_or(LogTarget::Disabled, LogTarget::File))?;
            let (engine, config, _loader) = setup(&cli)?;
            run_editor(engine, config, cli.file.as_deref())
        }
    }
}

/// Builds the engine and starts fetching currency rates unless disabled.
fn setup(cli: &Cli) -> anyhow::Result<(Arc<Engine>, Config, Option<JoinHandle<()>>)> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.offline {
        config.currency.enabled = false;
    }
    if let Some(url) = &cli.rates_url {
        config.currency.url = url.clone();
    }

    let engine = Arc::new(
        Engine::standard(config.engine.clone()).context("failed to install engine extensions")?,
    );
    info!(extensions = ?engine.extensions(), "Engine ready");

    let loader = if config.currency.enabled {
        let http = HttpRateProvider::new(
            config.currency.url.clone(),
            Duration::from_secs(config.currency.timeout_secs),
        )
        .context("failed to create HTTP client")?;
        let provider = CachedRateProvider::new(http, config.currency.cache_path(), config.currency.ttl_days);
        spawn_currency_loader(engine.currency_loader(), provider)
    } else {
        info!("Currency rates disabled");
        None
    };

    Ok((engine, config, loader))
}

fn print_document(
    engine: Arc<Engine>,
    config: Config,
    loader: Option<JoinHandle<()>>,
    file: &Path,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    if let Some(handle) = loader {
        if handle.join().is_err() {
            warn!("Currency loader panicked");
        }
    }

    let formatter = Formatter::new(config.format);
    let lines: Vec<&str> = text.lines().collect();
    let mut document = MathDocument::new(engine);
    let results = document.evaluate(lines.as_slice());

    for (index, line) in lines.iter().enumerate() {
        match results.get(&index) {
            Some(value) => println!("{} = {}", line, formatter.format(value)),
            None => println!("{}", line),
        }
    }
    Ok(())
}

fn run_editor(engine: Arc<Engine>, config: Config, file: Option<&Path>) -> anyhow::Result<()> {
    let mut app = App::new(engine, Formatter::new(config.format));
    if let Some(path) = file {
        let filename = path.to_string_lossy().into_owned();
        if path.exists() {
            let loaded = FileRepository::load_document(&filename);
            app.set_load_result(loaded);
        } else {
            app.filename = Some(filename);
        }
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err:?}");
    }
    Ok(())
}

/// Main event loop. Ctrl+Q quits from any mode.
fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.refresh();
        terminal.draw(|f| render_ui(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                match key.code {
                    KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                    _ => InputHandler::handle_key_event(app, key.code, key.modifiers),
                }
            }
        }
    }
}
