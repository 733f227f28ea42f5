//! File watcher for the profile cache.
//!
//! Another process sharing the cache (a second console, say) writes it when
//! its user changes the photo. [`ProfileWatcher`] turns those writes into
//! events on a tokio [`watch`] channel; the owner of the
//! [`ProfileSession`](super::ProfileSession) reacts by calling
//! [`apply_external`](super::ProfileSession::apply_external), which feeds the
//! session's own update channel.
//!
//! Uses debouncing so a write that lands as several filesystem events is
//! reported once.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::RecommendedWatcher;
use notify_debouncer_mini::{DebounceEventResult, DebouncedEvent, Debouncer, new_debouncer};
use tokio::sync::watch;

/// Debounce window used by the console.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Errors from setting up the watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The cache directory could not be created or the watcher thread could
    /// not be spawned.
    #[error("cannot watch profile cache at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The platform watcher refused the path.
    #[error("cannot watch profile cache: {0}")]
    Notify(#[from] notify::Error),
}

/// Event emitted when the cache file changes on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The cache file was written, replaced or removed.
    Changed,
    /// The platform watcher reported an error.
    Error(String),
}

/// Watches one profile cache file. Dropping it stops the watch.
pub struct ProfileWatcher {
    path: PathBuf,
    events: watch::Receiver<Option<CacheEvent>>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ProfileWatcher {
    /// Starts watching `cache_path`. The file itself need not exist yet; its
    /// directory is created and watched.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the directory cannot be created or watched.
    pub fn start(cache_path: impl Into<PathBuf>, debounce: Duration) -> Result<Self, WatchError> {
        let path = cache_path.into();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| WatchError::Io {
            path: dir.clone(),
            source,
        })?;

        let (notify_tx, notify_rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, notify_tx)?;
        debouncer
            .watcher()
            .watch(&dir, notify::RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "watching profile cache");

        let (event_tx, events) = watch::channel(None);
        let file_name = path.file_name().map(ToOwned::to_owned);
        // Ends once the debouncer is dropped and its sender with it.
        std::thread::Builder::new()
            .name("profile-watcher".to_string())
            .spawn(move || forward_events(&notify_rx, &event_tx, file_name))
            .map_err(|source| WatchError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            events,
            _debouncer: debouncer,
        })
    }

    /// The watched cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next change to the cache file.
    ///
    /// Returns `None` once the watcher has stopped.
    pub async fn wait_for_change(&mut self) -> Option<CacheEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }
}

fn forward_events(
    rx: &mpsc::Receiver<DebounceEventResult>,
    tx: &watch::Sender<Option<CacheEvent>>,
    file_name: Option<OsString>,
) {
    while let Ok(result) = rx.recv() {
        let event = match result {
            Ok(events) => {
                if !events.iter().any(|e| is_cache_file(e, file_name.as_deref())) {
                    continue;
                }
                tracing::debug!(batch = events.len(), "profile cache changed on disk");
                CacheEvent::Changed
            }
            Err(err) => {
                tracing::warn!(error = %err, "profile cache watcher error");
                CacheEvent::Error(err.to_string())
            }
        };
        if tx.send(Some(event)).is_err() {
            tracing::debug!("profile watcher receiver dropped, stopping");
            return;
        }
    }
    tracing::debug!("profile watcher stopped");
}

fn is_cache_file(event: &DebouncedEvent, file_name: Option<&OsStr>) -> bool {
    file_name.is_some() && event.path.file_name() == file_name
}
