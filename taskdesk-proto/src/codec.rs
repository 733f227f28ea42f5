//! Conversion between [`Task`] records and stored documents.
//!
//! Stored field names are `title`, `dueDate`, `notes`, `priority`, `status`
//! and `createdAt`. Decoding is lenient about the shapes older clients
//! wrote (missing status or priority, empty strings, nulls) and strict
//! about values outside the known enumerations.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::document::{Document, DocumentWrite, Fields};
use crate::task::{NormalizedPatch, Priority, Task, TaskDraft, TaskId, TaskStatus, Timestamp};

/// Field name of the server-assigned creation time.
pub const CREATED_AT: &str = "createdAt";

/// Error type for document decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A field had an unexpected type or value.
    #[error("malformed document {id}: {source}")]
    Malformed {
        /// Document id.
        id: String,
        /// Underlying deserialization error.
        source: serde_json::Error,
    },
    /// The document has no creation timestamp yet.
    #[error("document {id} has no createdAt")]
    MissingCreatedAt {
        /// Document id.
        id: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    due_date: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    notes: Option<String>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    created_at: Option<u64>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Decodes a stored document into a [`Task`].
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if a field has the wrong type or an
/// unknown enumeration value, or [`CodecError::MissingCreatedAt`] if the
/// creation timestamp is absent.
pub fn decode_task(doc: &Document) -> Result<Task, CodecError> {
    let record: TaskRecord = serde_json::from_value(Value::Object(doc.fields.clone())).map_err(
        |source| CodecError::Malformed {
            id: doc.id.clone(),
            source,
        },
    )?;
    let created_at = record
        .created_at
        .ok_or_else(|| CodecError::MissingCreatedAt { id: doc.id.clone() })?;
    Ok(Task {
        id: TaskId::new(doc.id.clone()),
        title: record.title.unwrap_or_default(),
        due_date: record.due_date,
        notes: record.notes,
        priority: record.priority,
        status: record.status,
        created_at: Timestamp::from_millis(created_at),
    })
}

/// Encodes a [`Task`] as a stored document.
#[must_use]
pub fn encode_task(task: &Task) -> Document {
    let mut fields = Fields::new();
    fields.insert("title".to_string(), Value::from(task.title.clone()));
    fields.insert("dueDate".to_string(), opt_string(task.due_date.as_deref()));
    fields.insert("notes".to_string(), opt_string(task.notes.as_deref()));
    fields.insert(
        "priority".to_string(),
        task.priority.map_or(Value::Null, |p| Value::from(p.as_str())),
    );
    fields.insert(
        "status".to_string(),
        task.status.map_or(Value::Null, |s| Value::from(s.as_str())),
    );
    fields.insert(CREATED_AT.to_string(), Value::from(task.created_at.as_millis()));
    Document {
        id: task.id.as_str().to_string(),
        fields,
    }
}

/// Builds the write for a new task from an already-normalized draft.
///
/// Every field is written, absent ones as `null`, and `createdAt` is left
/// for the store to fill.
#[must_use]
pub fn draft_write(draft: &TaskDraft) -> DocumentWrite {
    DocumentWrite::new()
        .field("title", draft.title.clone())
        .field("dueDate", opt_string(draft.due_date.as_deref()))
        .field("notes", opt_string(draft.notes.as_deref()))
        .field(
            "priority",
            draft.priority.map_or(Value::Null, |p| Value::from(p.as_str())),
        )
        .field(
            "status",
            draft.status.map_or(Value::Null, |s| Value::from(s.as_str())),
        )
        .server_timestamp(CREATED_AT)
}

/// Builds a merge write containing only the fields present in `patch`.
#[must_use]
pub fn patch_write(patch: &NormalizedPatch) -> DocumentWrite {
    let mut write = DocumentWrite::new();
    if let Some(title) = &patch.title {
        write = write.field("title", title.clone());
    }
    if let Some(due_date) = &patch.due_date {
        write = write.field("dueDate", opt_string(due_date.as_deref()));
    }
    if let Some(notes) = &patch.notes {
        write = write.field("notes", opt_string(notes.as_deref()));
    }
    if let Some(priority) = patch.priority {
        write = write.field("priority", priority.as_str());
    }
    if let Some(status) = patch.status {
        write = write.field("status", status.as_str());
    }
    write
}

fn opt_string(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}
