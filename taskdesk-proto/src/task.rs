//! Task record types and write-side validation.
//!
//! A [`Task`] is the read-side view of one document in a task collection.
//! Writes go through [`TaskDraft`] (create) and [`TaskPatch`] (update), both
//! of which are trimmed and validated locally before anything is sent to the
//! document store.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default maximum task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Calendar format used for stored due dates.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Opaque task identifier assigned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a store-assigned document id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw document id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned timestamp in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since epoch.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns milliseconds since epoch.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

/// Task urgency. Ascending order is most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Most urgent.
    High,
    /// Default for new tasks created from the dashboard form.
    Medium,
    /// Least urgent.
    Low,
}

impl Priority {
    /// All priorities in ascending (most urgent first) order.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Position in the ascending order: High = 0, Medium = 1, Low = 2.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    /// Returns the stored document value for this priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Parses a priority case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started. Shown for tasks with no stored status.
    Pending,
    /// Being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Done.
    Completed,
}

impl TaskStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    /// Returns the stored document value for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// Parses a status case-insensitively, accepting `in_progress`,
    /// `in-progress` and `inprogress` as well as the stored form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "pending" => Some(Self::Pending),
            "inprogress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as mirrored from the document store.
///
/// Fields that may be missing from a stored document are `Option`s; in
/// particular `status` stays `None` for documents written without one so
/// that status filters can tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Store-assigned id.
    pub id: TaskId,
    /// Task title.
    pub title: String,
    /// Due date as `YYYY-MM-DD` text.
    pub due_date: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Urgency, if one was chosen.
    pub priority: Option<Priority>,
    /// Stored status, if any.
    pub status: Option<TaskStatus>,
    /// Server-assigned creation time.
    pub created_at: Timestamp,
}

impl Task {
    /// Status used for display: the stored status or [`TaskStatus::Pending`].
    #[must_use]
    pub fn effective_status(&self) -> TaskStatus {
        self.status.unwrap_or(TaskStatus::Pending)
    }
}

/// Errors raised by local write validation. These never reach the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is empty after trimming.
    #[error("task title is required")]
    TitleEmpty,
    /// Title exceeds the configured maximum.
    #[error("task title too long ({len} characters, max {max})")]
    TitleTooLong {
        /// Length of the trimmed title in characters.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// Due date is not a `YYYY-MM-DD` calendar date.
    #[error("invalid due date {0:?}, expected YYYY-MM-DD")]
    InvalidDueDate(String),
    /// An update carried no fields.
    #[error("update has no fields")]
    EmptyPatch,
}

/// Field set for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Task title (required).
    pub title: String,
    /// Optional due date text.
    pub due_date: Option<String>,
    /// Optional notes.
    pub notes: Option<String>,
    /// Optional priority.
    pub priority: Option<Priority>,
    /// Optional initial status.
    pub status: Option<TaskStatus>,
}

impl TaskDraft {
    /// Starts a draft with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the due date.
    #[must_use]
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Sets the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the initial status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns a trimmed copy of this draft, or the first validation failure.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`], [`ValidationError::TitleTooLong`]
    /// or [`ValidationError::InvalidDueDate`].
    pub fn normalize(&self, max_title_len: usize) -> Result<Self, ValidationError> {
        Ok(Self {
            title: normalize_title(&self.title, max_title_len)?,
            due_date: normalize_due_date(self.due_date.as_deref())?,
            notes: normalize_notes(self.notes.as_deref()),
            priority: self.priority,
            status: self.status,
        })
    }
}

/// Partial field set for an update. `None` fields are left untouched.
///
/// For `due_date` and `notes`, `Some` of an empty (or all-whitespace) string
/// clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New due date, or empty to clear.
    pub due_date: Option<String>,
    /// New notes, or empty to clear.
    pub notes: Option<String>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New status.
    pub status: Option<TaskStatus>,
}

/// A validated [`TaskPatch`]. Cleared optional fields are `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::option_option)]
pub struct NormalizedPatch {
    /// Trimmed title.
    pub title: Option<String>,
    /// Parsed due date; `Some(None)` clears it.
    pub due_date: Option<Option<String>>,
    /// Trimmed notes; `Some(None)` clears them.
    pub notes: Option<Option<String>>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New status.
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that rewrites every editable field from a draft, the way the
    /// dashboard's edit form does. Absent draft fields clear stored ones.
    #[must_use]
    pub fn full(draft: TaskDraft) -> Self {
        Self {
            title: Some(draft.title),
            due_date: Some(draft.due_date.unwrap_or_default()),
            notes: Some(draft.notes.unwrap_or_default()),
            priority: draft.priority,
            status: draft.status,
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets or clears the due date.
    #[must_use]
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Sets or clears the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.due_date.is_none()
            && self.notes.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }

    /// Trims and validates the fields present in this patch.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPatch`] if no field is set, otherwise
    /// the same errors as [`TaskDraft::normalize`] for the fields present.
    pub fn normalize(&self, max_title_len: usize) -> Result<NormalizedPatch, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        let title = self
            .title
            .as_deref()
            .map(|t| normalize_title(t, max_title_len))
            .transpose()?;
        let due_date = self
            .due_date
            .as_deref()
            .map(|d| normalize_due_date(Some(d)))
            .transpose()?;
        Ok(NormalizedPatch {
            title,
            due_date,
            notes: self.notes.as_deref().map(|n| normalize_notes(Some(n))),
            priority: self.priority,
            status: self.status,
        })
    }
}

fn normalize_title(title: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::TitleTooLong { len, max });
    }
    Ok(trimmed.to_string())
}

fn normalize_due_date(due_date: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = due_date.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT)
        .map(|date| Some(date.format(DUE_DATE_FORMAT).to_string()))
        .map_err(|_| ValidationError::InvalidDueDate(raw.to_string()))
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
