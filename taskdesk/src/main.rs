//! Live task list console.
//!
//! Runs a line-oriented console over an in-process document store. Every
//! write goes through the mutation gateway and shows up in the list only
//! once the store pushes it back. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/taskdesk/config.toml`).
//!
//! ```bash
//! cargo run --bin taskdesk -- --principal alice --sort priority
//! TASKDESK_PRINCIPAL=alice cargo run --bin taskdesk
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;

use taskdesk::board::TaskBoard;
use taskdesk::config::{CliArgs, ClientConfig};
use taskdesk::console::{Command, CommandError, Console, Output, describe_profile};
use taskdesk::identity::{LocalIdentity, PrincipalId};
use taskdesk::profile::watcher::{CacheEvent, DEFAULT_DEBOUNCE, ProfileWatcher};
use taskdesk::profile::{Profile, ProfileSession};
use taskdesk::store::memory::MemoryStore;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("taskdesk starting");

    let profile = match &config.profile_cache {
        Some(path) => ProfileSession::load(path).unwrap_or_else(|e| {
            eprintln!("Warning: {e}; profile kept in memory");
            ProfileSession::in_memory()
        }),
        None => ProfileSession::in_memory(),
    };
    let watcher = profile.cache_path().and_then(|path| {
        ProfileWatcher::start(path, DEFAULT_DEBOUNCE)
            .inspect_err(|e| {
                tracing::warn!(error = %e, "profile changes from other sessions will not be seen");
            })
            .ok()
    });
    let profile_rx = profile.subscribe();

    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(match &config.principal {
        Some(p) => LocalIdentity::signed_in(PrincipalId::new(p.as_str())),
        None => LocalIdentity::new(),
    });
    let mut board = TaskBoard::new(store, Arc::clone(&identity))
        .with_view(config.view)
        .with_mode(config.mode)
        .with_max_title_len(config.max_title_len);
    if let Err(e) = board.start().await {
        eprintln!("Warning: could not open task list: {e}");
    }

    let console = Console::new(board, identity, profile, config.timestamp_format.clone());
    let result = run_console(console, watcher, profile_rx).await;

    tracing::info!("taskdesk exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file so they never interleave with console output.
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskdesk.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Waits for the next cache write, or forever when the cache is not watched.
async fn next_cache_event(watcher: Option<&mut ProfileWatcher>) -> Option<CacheEvent> {
    match watcher {
        Some(watcher) => watcher.wait_for_change().await,
        None => std::future::pending().await,
    }
}

/// Reads commands from stdin, board events and profile changes until `quit`
/// or end of input.
async fn run_console(
    mut console: Console<MemoryStore>,
    mut watcher: Option<ProfileWatcher>,
    mut profile_rx: watch::Receiver<Profile>,
) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut board_open = true;
    let mut profile_open = true;

    println!("{}", console.render());
    println!("type `help` for commands");

    loop {
        tokio::select! {
            // Board events first, so a login is followed before the next line runs.
            biased;

            event = console.board_mut().next_event(), if board_open => {
                match event {
                    Some(event) => {
                        if let Some(text) = console.describe_event(&event) {
                            println!("{text}");
                        }
                    }
                    None => board_open = false,
                }
            }
            event = next_cache_event(watcher.as_mut()), if watcher.is_some() => {
                match event {
                    Some(CacheEvent::Changed) => {
                        if let Err(e) = console.profile().apply_external() {
                            println!("error: {e}");
                        }
                    }
                    Some(CacheEvent::Error(e)) => tracing::debug!(error = %e, "profile watch error"),
                    None => watcher = None,
                }
            }
            changed = profile_rx.changed(), if profile_open => {
                if changed.is_err() {
                    profile_open = false;
                } else {
                    let profile = profile_rx.borrow_and_update().clone();
                    println!("{}", describe_profile(&profile));
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(CommandError::Empty) => continue,
                    Err(e) => {
                        println!("error: {e}");
                        continue;
                    }
                };
                match console.execute(command).await {
                    Ok(Output::Text(text)) => println!("{text}"),
                    Ok(Output::Silent) => {}
                    Ok(Output::Quit) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "command failed");
                        println!("error: {e}");
                    }
                }
            }
        }
    }
    Ok(())
}
