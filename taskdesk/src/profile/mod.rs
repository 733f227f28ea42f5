//! Profile session: the signed-in user's display profile.
//!
//! One [`ProfileSession`] owns the profile and publishes every change on a
//! [`watch`] channel. The photo URL is cached to a JSON file so it survives
//! restarts. Writes by another process sharing the cache are picked up by
//! [`watcher::ProfileWatcher`] and folded in with
//! [`ProfileSession::apply_external`].

pub mod watcher;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Errors from loading or persisting the profile cache.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Reading or writing the cache file failed.
    #[error("profile cache I/O error at {path}: {source}")]
    Io {
        /// Cache file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The cache file does not hold a valid profile.
    #[error("profile cache at {path} is malformed: {source}")]
    Malformed {
        /// Cache file path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Display profile of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// URL of the profile photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Name shown next to the photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Owned profile state with publish/subscribe.
#[derive(Debug)]
pub struct ProfileSession {
    tx: watch::Sender<Profile>,
    cache_path: Option<PathBuf>,
}

impl ProfileSession {
    /// Creates a session with no cache file.
    #[must_use]
    pub fn in_memory() -> Self {
        let (tx, _rx) = watch::channel(Profile::default());
        Self {
            tx,
            cache_path: None,
        }
    }

    /// Creates a session backed by `cache_path`, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(cache_path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let cache_path = cache_path.into();
        let profile = read_cache(&cache_path)?.unwrap_or_default();
        tracing::debug!(path = %cache_path.display(), has_photo = profile.photo_url.is_some(), "profile loaded");
        let (tx, _rx) = watch::channel(profile);
        Ok(Self {
            tx,
            cache_path: Some(cache_path),
        })
    }

    /// Cache file backing this session, if any.
    #[must_use]
    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Snapshot of the current profile.
    #[must_use]
    pub fn current(&self) -> Profile {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every profile change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Profile> {
        self.tx.subscribe()
    }

    /// Sets or clears the photo URL.
    ///
    /// The cache is written only when a photo is present; clearing the photo
    /// leaves the cached value in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Io`] if the cache cannot be written. The
    /// in-memory profile is updated regardless.
    pub fn set_photo(&self, url: Option<String>) -> Result<(), ProfileError> {
        let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        self.tx.send_modify(|p| p.photo_url.clone_from(&url));
        if url.is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Sets or clears the display name. Not persisted on its own.
    pub fn set_display_name(&self, name: Option<String>) {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.tx.send_modify(|p| p.display_name = name);
    }

    /// Reloads the profile after another process wrote the cache.
    ///
    /// Returns `true` if the profile changed. A missing cache leaves the
    /// profile unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if the cache cannot be read or parsed.
    pub fn apply_external(&self) -> Result<bool, ProfileError> {
        let Some(path) = &self.cache_path else {
            return Ok(false);
        };
        let Some(external) = read_cache(path)? else {
            return Ok(false);
        };
        let changed = self.tx.send_if_modified(|p| {
            if *p == external {
                false
            } else {
                *p = external;
                true
            }
        });
        if changed {
            tracing::info!(path = %path.display(), "profile updated from external change");
        }
        Ok(changed)
    }

    fn persist(&self) -> Result<(), ProfileError> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let io_err = |source: std::io::Error| ProfileError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.current()).map_err(|source| {
            ProfileError::Malformed {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        tracing::debug!(path = %path.display(), "profile cache written");
        Ok(())
    }
}

fn read_cache(path: &Path) -> Result<Option<Profile>, ProfileError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ProfileError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| ProfileError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}
