//! Document store vocabulary: paths, documents, writes, and the change
//! messages a collection subscription delivers.

use std::fmt;

use serde_json::{Map, Value};

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// Slash-separated path to a collection, e.g. `users/alice/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Legacy unscoped task collection shared by every user.
    pub const SHARED_TASKS: &'static str = "tasks";

    /// Creates a collection path from its string form.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Per-user task collection: `users/{principal}/tasks`.
    #[must_use]
    pub fn user_tasks(principal: &str) -> Self {
        Self(format!("users/{principal}/tasks"))
    }

    /// The legacy shared `tasks` collection.
    #[must_use]
    pub fn shared_tasks() -> Self {
        Self(Self::SHARED_TASKS.to_string())
    }

    /// Path of the document `id` inside this collection.
    #[must_use]
    pub fn doc(&self, id: &str) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    /// Returns the path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    /// Owning collection.
    pub collection: CollectionPath,
    /// Document id within the collection.
    pub id: String,
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document as delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Field values.
    pub fields: Fields,
}

/// Fields to write, plus the names of fields the store must fill with its
/// own clock at commit time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    /// Literal field values.
    pub fields: Fields,
    /// Fields set to the server timestamp.
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    /// Creates an empty write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a literal field value.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Marks `name` to be filled with the server timestamp.
    #[must_use]
    pub fn server_timestamp(mut self, name: &str) -> Self {
        self.server_timestamps.push(name.to_string());
        self
    }

    /// Names of every field this write touches.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .map(String::as_str)
            .chain(self.server_timestamps.iter().map(String::as_str))
    }
}

/// One change within a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    /// A document entered the collection.
    Added(Document),
    /// A document's fields changed. Carries the full new snapshot.
    Modified(Document),
    /// A document left the collection.
    Removed {
        /// Id of the removed document.
        id: String,
    },
}

impl DocumentChange {
    /// Id of the document this change refers to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Added(doc) | Self::Modified(doc) => &doc.id,
            Self::Removed { id } => id,
        }
    }
}

/// Messages delivered on a collection subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// Incremental changes, applied in order.
    Changes {
        /// Collection the changes belong to.
        collection: CollectionPath,
        /// Ordered changes.
        changes: Vec<DocumentChange>,
    },
    /// Complete contents of the collection, ordered by creation time.
    ///
    /// Sent as the first message of a subscription and again after a
    /// reconnect. Receivers replace everything they hold.
    FullState {
        /// Collection the documents belong to.
        collection: CollectionPath,
        /// Every document currently in the collection.
        documents: Vec<Document>,
    },
}

impl SyncMessage {
    /// Collection this message refers to.
    #[must_use]
    pub const fn collection(&self) -> &CollectionPath {
        match self {
            Self::Changes { collection, .. } | Self::FullState { collection, .. } => collection,
        }
    }
}
