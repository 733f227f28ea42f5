//! Derived views over the mirror: status filter plus sort.
//!
//! [`derive_view`] is a pure function of its inputs. It takes the mirror's
//! baseline-ordered tasks and returns a fresh vector; the mirror itself is
//! never touched.

use std::fmt;

use taskdesk_proto::task::{Task, TaskStatus};

/// Field a view is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Keep baseline (creation) order.
    #[default]
    None,
    /// Title text.
    Title,
    /// Due date text.
    DueDate,
    /// Priority rank; unset priority sorts last.
    Priority,
}

impl SortKey {
    /// Parses `none`, `title`, `due`/`duedate`/`due_date`, or `priority`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "created" => Some(Self::None),
            "title" => Some(Self::Title),
            "due" | "duedate" | "due_date" | "due-date" => Some(Self::DueDate),
            "priority" => Some(Self::Priority),
            _ => None,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Title => "title",
            Self::DueDate => "dueDate",
            Self::Priority => "priority",
        })
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Parses `asc` or `desc`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    /// The other direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// Sort key plus direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    /// Field to sort by.
    pub key: SortKey,
    /// Direction.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Creates a sort spec.
    #[must_use]
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Selecting the active ascending key again flips it to descending;
    /// any other selection sorts ascending by `key`.
    #[must_use]
    pub fn toggled(self, key: SortKey) -> Self {
        let direction = if self.key == key && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self { key, direction }
    }
}

/// Parameters of a derived view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ViewParams {
    /// Keep only tasks whose stored status equals this one.
    pub status_filter: Option<TaskStatus>,
    /// Ordering of the result.
    pub sort: SortSpec,
}

/// Computes the filtered, sorted view of `baseline`.
///
/// `baseline` must be in mirror order; ties and [`SortKey::None`] keep that
/// order. For text keys the descending result is exactly the ascending one
/// reversed.
#[must_use]
pub fn derive_view<'a>(baseline: &[&'a Task], params: &ViewParams) -> Vec<&'a Task> {
    let filtered = filter_by_status(baseline, params.status_filter);
    sort_tasks(filtered, params.sort)
}

/// Keeps the tasks whose stored status equals `status`. A task without a
/// stored status matches no filter. `None` keeps everything.
#[must_use]
pub fn filter_by_status<'a>(tasks: &[&'a Task], status: Option<TaskStatus>) -> Vec<&'a Task> {
    match status {
        None => tasks.to_vec(),
        Some(wanted) => tasks
            .iter()
            .copied()
            .filter(|t| t.status == Some(wanted))
            .collect(),
    }
}

/// Sorts `tasks` by `spec`, stable with respect to the input order.
#[must_use]
pub fn sort_tasks(mut tasks: Vec<&Task>, spec: SortSpec) -> Vec<&Task> {
    match spec.key {
        SortKey::None => tasks,
        SortKey::Title => {
            tasks.sort_by(|a, b| a.title.cmp(&b.title));
            orient(tasks, spec.direction)
        }
        SortKey::DueDate => {
            tasks.sort_by(|a, b| {
                let a = a.due_date.as_deref().unwrap_or_default();
                let b = b.due_date.as_deref().unwrap_or_default();
                a.cmp(b)
            });
            orient(tasks, spec.direction)
        }
        SortKey::Priority => {
            let (mut ranked, unset): (Vec<&Task>, Vec<&Task>) =
                tasks.into_iter().partition(|t| t.priority.is_some());
            ranked.sort_by_key(|t| t.priority.map(|p| p.rank()));
            let mut ordered = orient(ranked, spec.direction);
            ordered.extend(unset);
            ordered
        }
    }
}

fn orient(mut tasks: Vec<&Task>, direction: SortDirection) -> Vec<&Task> {
    if direction == SortDirection::Desc {
        tasks.reverse();
    }
    tasks
}
