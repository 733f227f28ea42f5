//! Configuration system for the `Taskdesk` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdesk/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;

use taskdesk_proto::task::{MAX_TASK_TITLE_LENGTH, TaskStatus};

use crate::board::BoardMode;
use crate::tasks::{SortDirection, SortKey, SortSpec, ViewParams};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A setting holds a value outside its allowed set.
    #[error("invalid value {value:?} for {field}")]
    InvalidValue {
        /// Setting name, e.g. `view.sort`.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    session: SessionFileConfig,
    view: ViewFileConfig,
    tasks: TasksFileConfig,
    ui: UiFileConfig,
    profile: ProfileFileConfig,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    principal: Option<String>,
    shared: Option<bool>,
}

/// `[view]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ViewFileConfig {
    sort: Option<String>,
    direction: Option<String>,
    status: Option<String>,
}

/// `[tasks]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TasksFileConfig {
    max_title_len: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
}

/// `[profile]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProfileFileConfig {
    cache_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Session --
    /// Principal signed in at startup.
    pub principal: Option<String>,
    /// Which collection the board follows.
    pub mode: BoardMode,

    // -- View --
    /// Initial filter and sort.
    pub view: ViewParams,

    // -- Tasks --
    /// Maximum task title length in characters.
    pub max_title_len: usize,

    // -- UI --
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,

    // -- Profile --
    /// Profile cache file; `None` keeps the profile in memory only.
    pub profile_cache: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            principal: None,
            mode: BoardMode::Personal,
            view: ViewParams::default(),
            max_title_len: MAX_TASK_TITLE_LENGTH,
            timestamp_format: "%Y-%m-%d %H:%M".to_string(),
            profile_cache: default_profile_cache(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/taskdesk/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if a sort key, direction, or status is not recognised.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let sort_key = match cli.sort.as_deref().or(file.view.sort.as_deref()) {
            Some(s) => parse_setting("view.sort", s, SortKey::parse)?,
            None => defaults.view.sort.key,
        };
        let direction = match cli.direction.as_deref().or(file.view.direction.as_deref()) {
            Some(s) => parse_setting("view.direction", s, SortDirection::parse)?,
            None => defaults.view.sort.direction,
        };
        let status_filter = match cli.status.as_deref().or(file.view.status.as_deref()) {
            Some("all" | "") => None,
            Some(s) => Some(parse_setting("view.status", s, TaskStatus::parse)?),
            None => defaults.view.status_filter,
        };
        let shared = cli.shared || file.session.shared.unwrap_or(false);

        Ok(Self {
            principal: cli
                .principal
                .clone()
                .or_else(|| file.session.principal.clone()),
            mode: if shared {
                BoardMode::Shared
            } else {
                defaults.mode
            },
            view: ViewParams {
                status_filter,
                sort: SortSpec::new(sort_key, direction),
            },
            max_title_len: file
                .tasks
                .max_title_len
                .unwrap_or(defaults.max_title_len),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
            profile_cache: file
                .profile
                .cache_path
                .clone()
                .or(defaults.profile_cache),
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Live task list console")]
pub struct CliArgs {
    /// Principal to sign in as at startup.
    #[arg(long, env = "TASKDESK_PRINCIPAL")]
    pub principal: Option<String>,

    /// Follow the shared `tasks` collection instead of your own.
    #[arg(long)]
    pub shared: bool,

    /// Path to config file (default: `~/.config/taskdesk/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial sort key (none, title, due, priority).
    #[arg(long)]
    pub sort: Option<String>,

    /// Initial sort direction (asc, desc).
    #[arg(long)]
    pub direction: Option<String>,

    /// Initial status filter (pending, in-progress, completed, all).
    #[arg(long)]
    pub status: Option<String>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKDESK_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskdesk.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_setting<T>(
    field: &'static str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    parse(value).ok_or_else(|| ConfigError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn default_profile_cache() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("taskdesk").join("profile.json"))
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskdesk").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
