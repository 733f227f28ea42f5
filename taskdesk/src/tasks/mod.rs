//! Live task list: mirror, derived views, and the mutation gateway.
//!
//! Writes go out through [`MutationGateway`]; their effects come back through
//! the store subscription into [`LiveMirror`]; [`derive_view`] projects the
//! mirror into a filtered, sorted list for display.

pub mod gateway;
pub mod mirror;
pub mod view;

pub use gateway::{MutationError, MutationGateway};
pub use mirror::{ChangeSummary, LiveMirror, MirrorEvent, MirrorState, SubscriptionHandle};
pub use view::{SortDirection, SortKey, SortSpec, ViewParams, derive_view};

use std::fmt;

use taskdesk_proto::document::CollectionPath;

use crate::identity::PrincipalId;

/// Which remote collection a mirror or gateway works against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// The signed-in principal's own list (`users/{id}/tasks`).
    User(PrincipalId),
    /// The legacy unscoped `tasks` collection.
    Shared,
}

impl ScopeKey {
    /// Collection path for this scope.
    #[must_use]
    pub fn collection(&self) -> CollectionPath {
        match self {
            Self::User(principal) => CollectionPath::user_tasks(principal.as_str()),
            Self::Shared => CollectionPath::shared_tasks(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(principal) => write!(f, "user:{principal}"),
            Self::Shared => f.write_str("shared"),
        }
    }
}
