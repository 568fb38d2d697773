mod hub;
mod state;
mod subscriptions;
mod ui;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{env, fs, io, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};
use url::Url;

const DEFAULT_WATCHER_ADDR: &str = "localhost:9000";
const WATCHER_PATH: &str = "/ws/repositoryWatcher";
const TICK_MS: u64 = 250;
const CHANNEL_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "repowatch-dash")]
struct Args {
    /// Full ws:// URL of the watcher service.
    #[arg(long, default_value = "")]
    watcher_url: String,
    /// host:port of the watcher service; the standard path is appended.
    #[arg(long, default_value = "")]
    watcher_addr: String,
    #[arg(long, default_value = "")]
    log_dir: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[derive(Clone, Debug)]
struct Config {
    watcher_url: Url,
    log_dir: String,
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args)?;
    init_logging(&config)?;

    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let hub_task = tokio::spawn(hub::hub_loop(
        config.watcher_url.clone(),
        outbound_rx,
        event_tx,
    ));

    let mut terminal = setup_terminal()?;
    let mut app = state::App::new(outbound_tx);
    let result = run_app(&mut terminal, &mut app, event_rx).await;
    restore_terminal(&mut terminal)?;
    hub_task.abort();
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut state::App,
    mut events: mpsc::Receiver<hub::WatchEvent>,
) -> Result<()> {
    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        tokio::select! {
            maybe_input = input.next() => {
                match maybe_input {
                    Some(Ok(Event::Key(key))) => {
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                            app.handle_key(key);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(event = "input_error", error = %err);
                    }
                    None => break,
                }
            }
            Some(event) = events.recv() => {
                app.apply_watch_event(event);
            }
            _ = ticker.tick() => app.on_tick(),
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn load_config(args: Args) -> Result<Config> {
    let watcher_url = resolve_watcher_url(&args.watcher_url, &args.watcher_addr)?;
    Ok(Config {
        watcher_url,
        log_dir: resolve_log_dir(&args.log_dir),
        debug: args.debug,
    })
}

fn resolve_watcher_url(flag_url: &str, flag_addr: &str) -> Result<Url> {
    if !flag_url.trim().is_empty() {
        return Url::parse(flag_url.trim()).context("invalid --watcher-url");
    }
    if let Ok(value) = env::var("REPOWATCH_URL") {
        if !value.trim().is_empty() {
            return Url::parse(value.trim()).context("invalid REPOWATCH_URL");
        }
    }
    let addr = if !flag_addr.trim().is_empty() {
        flag_addr.trim().to_string()
    } else {
        DEFAULT_WATCHER_ADDR.to_string()
    };
    Url::parse(&format!("ws://{addr}{WATCHER_PATH}")).context("invalid watcher address")
}

fn resolve_log_dir(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = env::var("REPOWATCH_LOG_DIR") {
        if !value.trim().is_empty() {
            return value;
        }
    }
    String::new()
}

/// The terminal owns stdout, so diagnostics go to a file under the log
/// dir, or nowhere when none is configured.
fn init_logging(config: &Config) -> Result<()> {
    let level = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let writer = if config.log_dir.trim().is_empty() {
        BoxMakeWriter::new(io::sink)
    } else {
        fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("creating log dir {}", config.log_dir))?;
        let path = PathBuf::from(&config.log_dir).join("repowatch-dash.log");
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        BoxMakeWriter::new(Arc::new(file))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_flag_wins() {
        let url = resolve_watcher_url("ws://example.test:9000/ws/repositoryWatcher", "ignored")
            .expect("url");
        assert_eq!(url.as_str(), "ws://example.test:9000/ws/repositoryWatcher");
    }

    #[test]
    fn addr_flag_gets_the_standard_path() {
        let url = resolve_watcher_url("", "127.0.0.1:9000").expect("url");
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/ws/repositoryWatcher");
    }

    #[test]
    fn bad_url_flag_is_an_error() {
        assert!(resolve_watcher_url("not a url", "").is_err());
    }
}
