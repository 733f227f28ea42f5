//! Line-oriented console front end.
//!
//! Each input line parses into a [`Command`]; [`Console::execute`] runs it
//! against the [`TaskBoard`] and returns text to print. Board events are
//! rendered separately through [`Console::describe_event`].
//!
//! Fields after the first argument are `;`-separated `key=value` segments:
//!
//! ```text
//! add Buy milk; due=2024-05-01; priority=high
//! edit 2 notes=; status=completed
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use taskdesk_proto::task::{Priority, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};

use crate::board::{BoardEvent, BoardMode, TaskBoard};
use crate::identity::{IdentityProvider, LocalIdentity, PrincipalId};
use crate::profile::{Profile, ProfileError, ProfileSession};
use crate::store::{DocumentStore, TransportError};
use crate::tasks::{MirrorState, MutationError, SortDirection, SortKey};

/// Help text printed by `help`.
pub const HELP: &str = "\
commands:
  login <principal>              sign in
  logout                         sign out
  shared on|off                  follow the shared task list
  add <title>[; key=value...]    create a task (due, notes, priority, status)
  edit <task> key=value[; ...]   change fields (title, due, notes, priority, status)
  status <task> <status>         set status (pending, in-progress, completed)
  rm <task>                      delete a task
  filter <status>|all            filter the list by status
  sort <key> [asc|desc]          sort by none, title, due, priority
  list                           show the list
  photo [url]                    set or clear the profile photo
  name [display name]            set or clear the display name
  whoami                         show who is signed in
  help                           show this text
  quit                           exit
<task> is a row number from the list or a prefix of the task id.";

/// Errors from parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line held no command.
    #[error("empty command")]
    Empty,

    /// The command word is not known.
    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),

    /// A required argument is missing.
    #[error("missing {0}")]
    MissingArgument(&'static str),

    /// A `key=value` segment names an unknown field.
    #[error("unknown field {0:?}")]
    UnknownField(String),

    /// A segment is not of the form `key=value`.
    #[error("expected key=value, got {0:?}")]
    MalformedSegment(String),

    /// A value is outside its allowed set.
    #[error("invalid {field}: {value:?}")]
    InvalidValue {
        /// Field being parsed.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Errors from running a command.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// The line did not parse.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A write was rejected.
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Reopening the subscription failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The profile cache could not be written.
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// No task matches the reference.
    #[error("no task {0}")]
    NoSuchTask(String),

    /// More than one task matches an id prefix.
    #[error("id prefix {0:?} matches more than one task")]
    Ambiguous(String),
}

/// Reference to a task typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    /// 1-based row in the current view.
    Row(usize),
    /// Prefix of a task id.
    Id(String),
}

impl TaskRef {
    /// A positive number is a row; anything else is an id prefix.
    fn parse(s: &str) -> Result<Self, CommandError> {
        match s.parse::<usize>() {
            Ok(0) => Err(CommandError::InvalidValue {
                field: "row",
                value: s.to_string(),
            }),
            Ok(row) => Ok(Self::Row(row)),
            Err(_) => Ok(Self::Id(s.to_string())),
        }
    }
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in.
    Login(PrincipalId),
    /// Sign out.
    Logout,
    /// Follow the shared collection (`true`) or the personal one.
    Shared(bool),
    /// Create a task.
    Add(TaskDraft),
    /// Update fields of a task.
    Edit {
        /// Task to change.
        target: TaskRef,
        /// Fields to write.
        patch: TaskPatch,
    },
    /// Change a task's status.
    Status {
        /// Task to change.
        target: TaskRef,
        /// New status.
        status: TaskStatus,
    },
    /// Delete a task.
    Remove {
        /// Task to delete.
        target: TaskRef,
    },
    /// Set or clear the status filter.
    Filter(Option<TaskStatus>),
    /// Sort by a key; without a direction the key toggles.
    Sort(SortKey, Option<SortDirection>),
    /// Print the view.
    List,
    /// Set or clear the profile photo.
    Photo(Option<String>),
    /// Set or clear the display name.
    Name(Option<String>),
    /// Print the signed-in principal and profile.
    WhoAmI,
    /// Print help.
    Help,
    /// Exit.
    Quit,
}

impl Command {
    /// Parses one input line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] describing the first problem found.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));
        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "login" => {
                let principal = required(rest, "principal")?;
                Ok(Self::Login(PrincipalId::new(principal)))
            }
            "logout" => Ok(Self::Logout),
            "shared" => match rest.to_ascii_lowercase().as_str() {
                "" | "on" => Ok(Self::Shared(true)),
                "off" => Ok(Self::Shared(false)),
                other => Err(invalid("shared", other)),
            },
            "add" => parse_add(rest),
            "edit" => {
                let (target, fields) = split_target(rest)?;
                let mut patch = TaskPatch::default();
                for (key, value) in segments(fields)? {
                    apply_patch_field(&mut patch, key, value)?;
                }
                if patch.is_empty() {
                    return Err(CommandError::MissingArgument("fields to change"));
                }
                Ok(Self::Edit { target, patch })
            }
            "status" => {
                let (target, status) = split_target(rest)?;
                let status = required(status, "status")?;
                Ok(Self::Status {
                    target,
                    status: parse_status(status)?,
                })
            }
            "rm" | "delete" => {
                let target = TaskRef::parse(required(rest, "task")?)?;
                Ok(Self::Remove { target })
            }
            "filter" => match rest.to_ascii_lowercase().as_str() {
                "" | "all" | "none" => Ok(Self::Filter(None)),
                _ => Ok(Self::Filter(Some(parse_status(rest)?))),
            },
            "sort" => {
                let mut parts = rest.split_whitespace();
                let key = parts.next().ok_or(CommandError::MissingArgument("sort key"))?;
                let key = SortKey::parse(key).ok_or_else(|| invalid("sort key", key))?;
                let direction = parts
                    .next()
                    .map(|d| SortDirection::parse(d).ok_or_else(|| invalid("direction", d)))
                    .transpose()?;
                Ok(Self::Sort(key, direction))
            }
            "list" | "ls" => Ok(Self::List),
            "photo" => Ok(Self::Photo(optional(rest))),
            "name" => Ok(Self::Name(optional(rest))),
            "whoami" => Ok(Self::WhoAmI),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn invalid(field: &'static str, value: &str) -> CommandError {
    CommandError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

fn required<'a>(s: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    let s = s.trim();
    if s.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(s)
    }
}

fn optional(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_status(s: &str) -> Result<TaskStatus, CommandError> {
    TaskStatus::parse(s).ok_or_else(|| invalid("status", s))
}

fn parse_priority(s: &str) -> Result<Priority, CommandError> {
    Priority::parse(s).ok_or_else(|| invalid("priority", s))
}

fn split_target(rest: &str) -> Result<(TaskRef, &str), CommandError> {
    let rest = required(rest, "task")?;
    let (target, tail) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(t, r)| (t, r.trim()));
    Ok((TaskRef::parse(target)?, tail))
}

fn segments(s: &str) -> Result<Vec<(&str, &str)>, CommandError> {
    s.split(';')
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            seg.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| CommandError::MalformedSegment(seg.to_string()))
        })
        .collect()
}

fn parse_add(rest: &str) -> Result<Command, CommandError> {
    let (title, fields) = rest.split_once(';').unwrap_or((rest, ""));
    // Same defaults as the dashboard's new-task form.
    let mut draft = TaskDraft::new(title.trim())
        .with_priority(Priority::Medium)
        .with_status(TaskStatus::Pending);
    for (key, value) in segments(fields)? {
        match key.to_ascii_lowercase().as_str() {
            "due" | "duedate" => draft.due_date = Some(value.to_string()),
            "notes" => draft.notes = Some(value.to_string()),
            "priority" => draft.priority = Some(parse_priority(value)?),
            "status" => draft.status = Some(parse_status(value)?),
            _ => return Err(CommandError::UnknownField(key.to_string())),
        }
    }
    Ok(Command::Add(draft))
}

fn apply_patch_field(patch: &mut TaskPatch, key: &str, value: &str) -> Result<(), CommandError> {
    match key.to_ascii_lowercase().as_str() {
        "title" => patch.title = Some(value.to_string()),
        "due" | "duedate" => patch.due_date = Some(value.to_string()),
        "notes" => patch.notes = Some(value.to_string()),
        "priority" => patch.priority = Some(parse_priority(value)?),
        "status" => patch.status = Some(parse_status(value)?),
        _ => return Err(CommandError::UnknownField(key.to_string())),
    }
    Ok(())
}

/// What the front end should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Print this text.
    Text(String),
    /// Nothing to print.
    Silent,
    /// Exit the loop.
    Quit,
}

/// Console state: the board plus the session pieces commands act on.
pub struct Console<S> {
    board: TaskBoard<S, LocalIdentity>,
    identity: Arc<LocalIdentity>,
    profile: ProfileSession,
    timestamp_format: String,
}

impl<S: DocumentStore> Console<S> {
    /// Creates a console over an already started board.
    #[must_use]
    pub fn new(
        board: TaskBoard<S, LocalIdentity>,
        identity: Arc<LocalIdentity>,
        profile: ProfileSession,
        timestamp_format: impl Into<String>,
    ) -> Self {
        Self {
            board,
            identity,
            profile,
            timestamp_format: timestamp_format.into(),
        }
    }

    /// The board, for driving its event loop.
    pub const fn board_mut(&mut self) -> &mut TaskBoard<S, LocalIdentity> {
        &mut self.board
    }

    /// The board.
    #[must_use]
    pub const fn board(&self) -> &TaskBoard<S, LocalIdentity> {
        &self.board
    }

    /// The profile session, for folding in external cache writes.
    #[must_use]
    pub const fn profile(&self) -> &ProfileSession {
        &self.profile
    }

    /// Runs one command.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError`] if a write is rejected, the task reference
    /// does not resolve, or the profile cannot be saved.
    pub async fn execute(&mut self, command: Command) -> Result<Output, ConsoleError> {
        tracing::debug!(?command, "executing console command");
        let output = match command {
            Command::Login(principal) => {
                let text = format!("signed in as {principal}");
                self.identity.sign_in(principal);
                Output::Text(text)
            }
            Command::Logout => {
                self.identity.sign_out();
                Output::Text("signed out".to_string())
            }
            Command::Shared(shared) => {
                let mode = if shared {
                    BoardMode::Shared
                } else {
                    BoardMode::Personal
                };
                self.board.set_mode(mode).await?;
                Output::Text(format!("following {}", self.describe_scope()))
            }
            Command::Add(draft) => {
                let id = self.board.gateway()?.create(&draft).await?;
                Output::Text(format!("created {}", short_id(&id)))
            }
            Command::Edit { target, patch } => {
                let id = self.resolve(&target)?;
                self.board.gateway()?.update(&id, &patch).await?;
                Output::Silent
            }
            Command::Status { target, status } => {
                let id = self.resolve(&target)?;
                self.board.gateway()?.set_status(&id, status).await?;
                Output::Silent
            }
            Command::Remove { target } => {
                let id = self.resolve(&target)?;
                self.board.gateway()?.delete(&id).await?;
                Output::Silent
            }
            Command::Filter(status) => {
                self.board.set_status_filter(status);
                Output::Text(self.render())
            }
            Command::Sort(key, Some(direction)) => {
                self.board.set_sort(key, direction);
                Output::Text(self.render())
            }
            Command::Sort(key, None) => {
                self.board.toggle_sort(key);
                Output::Text(self.render())
            }
            Command::List => Output::Text(self.render()),
            Command::Photo(url) => {
                self.profile.set_photo(url)?;
                Output::Silent
            }
            Command::Name(name) => {
                self.profile.set_display_name(name);
                Output::Silent
            }
            Command::WhoAmI => Output::Text(self.whoami()),
            Command::Help => Output::Text(HELP.to_string()),
            Command::Quit => Output::Quit,
        };
        Ok(output)
    }

    /// Turns a board event into a status line, if it is worth printing.
    #[must_use]
    pub fn describe_event(&self, event: &BoardEvent) -> Option<String> {
        match event {
            BoardEvent::Changed(summary) if summary.is_empty() => None,
            BoardEvent::Changed(_) => Some(self.render()),
            BoardEvent::Degraded(err) => {
                Some(format!("sync problem: {err} (showing last known list)"))
            }
            BoardEvent::ScopeChanged(_) => Some(format!("following {}", self.describe_scope())),
            BoardEvent::SubscriptionEnded => Some("sync stopped by the server".to_string()),
        }
    }

    fn describe_scope(&self) -> String {
        self.board
            .scope()
            .map_or_else(|| "nothing (signed out)".to_string(), |s| s.collection().to_string())
    }

    fn resolve(&self, target: &TaskRef) -> Result<TaskId, ConsoleError> {
        match target {
            TaskRef::Row(row) => self
                .board
                .view()
                .get(row.wrapping_sub(1))
                .map(|t| t.id.clone())
                .ok_or_else(|| ConsoleError::NoSuchTask(format!("at row {row}"))),
            TaskRef::Id(prefix) => {
                let tasks = self.board.mirror().tasks();
                let mut matches = tasks.iter().filter(|t| t.id.as_str().starts_with(prefix.as_str()));
                match (matches.next(), matches.next()) {
                    (Some(task), None) => Ok(task.id.clone()),
                    (None, _) => Err(ConsoleError::NoSuchTask(format!("with id {prefix}"))),
                    (Some(_), Some(_)) => Err(ConsoleError::Ambiguous(prefix.clone())),
                }
            }
        }
    }

    fn whoami(&self) -> String {
        let profile = self.profile.current();
        let principal = self
            .identity
            .current_principal()
            .map_or_else(|| "not signed in".to_string(), |p| p.to_string());
        format!(
            "principal: {principal}\nname: {}\nphoto: {}",
            profile.display_name.as_deref().unwrap_or("-"),
            profile.photo_url.as_deref().unwrap_or("-"),
        )
    }

    /// Renders the current view with a header line.
    #[must_use]
    pub fn render(&self) -> String {
        let params = self.board.params();
        let filter = params
            .status_filter
            .map_or("all", TaskStatus::as_str);
        let state = match self.board.state() {
            MirrorState::Closed => "closed",
            MirrorState::Unauthenticated => "signed out",
            MirrorState::Live => "live",
            MirrorState::Degraded(_) => "degraded",
        };
        let mut out = format!(
            "[{}] {} | filter: {filter} | sort: {} {}\n",
            state,
            self.describe_scope(),
            params.sort.key,
            params.sort.direction,
        );
        out.push_str(&render_tasks(&self.board.view(), &self.timestamp_format));
        out
    }
}

fn short_id(id: &TaskId) -> &str {
    id.as_str().get(..8).unwrap_or(id.as_str())
}

/// Status line for a published profile change.
#[must_use]
pub fn describe_profile(profile: &Profile) -> String {
    format!(
        "profile: name {}, photo {}",
        profile.display_name.as_deref().unwrap_or("-"),
        profile.photo_url.as_deref().unwrap_or("-"),
    )
}

/// Renders tasks as numbered rows. Absent optional fields print as `-`.
#[must_use]
pub fn render_tasks(tasks: &[&Task], timestamp_format: &str) -> String {
    if tasks.is_empty() {
        return "  (no tasks)".to_string();
    }
    let mut out = String::new();
    for (row, task) in tasks.iter().enumerate() {
        let created = i64::try_from(task.created_at.as_millis())
            .ok()
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map_or_else(|| "-".to_string(), |dt| dt.format(timestamp_format).to_string());
        let _ = writeln!(
            out,
            "{:>3}. {:<11} {:<32} due {:<10} {:<6} {} [{}] {}",
            row + 1,
            task.effective_status().as_str(),
            task.title,
            task.due_date.as_deref().unwrap_or("-"),
            task.priority.map_or("-", Priority::as_str),
            created,
            short_id(&task.id),
            task.notes.as_deref().unwrap_or("-"),
        );
    }
    out.truncate(out.trim_end().len());
    out
}
