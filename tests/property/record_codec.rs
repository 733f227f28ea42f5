//! Property-based tests for the task record codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary field maps never cause a panic in `decode_task`.
//! 2. Any task survives `encode_task` → `decode_task` unchanged.
//! 3. Normalized drafts always carry a trimmed, non-empty title.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use serde_json::Value;
use taskdesk_proto::codec::{CREATED_AT, decode_task, draft_write, encode_task};
use taskdesk_proto::document::{Document, Fields};
use taskdesk_proto::task::{
    MAX_TASK_TITLE_LENGTH, Priority, Task, TaskDraft, TaskId, TaskStatus, Timestamp,
    ValidationError,
};

// --- Arbitrary implementations for record types ---

/// Strategy for loosely JSON-shaped field values.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        ".{0,16}".prop_map(Value::from),
        prop::sample::select(vec!["High", "Medium", "Low", "Pending", "In Progress", "Completed"])
            .prop_map(Value::from),
    ]
}

/// Strategy for field maps mixing known and unknown keys.
fn arb_fields() -> impl Strategy<Value = Fields> {
    let key = prop::sample::select(vec![
        "title", "dueDate", "notes", "priority", "status", "createdAt", "color",
    ]);
    prop::collection::vec((key, arb_value()), 0..8).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    })
}

/// Optional text that is never blank (blank text decodes as absent).
fn arb_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z0-9][a-z0-9 ]{0,15}")
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-zA-Z0-9]{1,12}",
        ".{0,40}",
        arb_text(),
        arb_text(),
        prop::option::of(prop::sample::select(Priority::ALL.to_vec())),
        prop::option::of(prop::sample::select(TaskStatus::ALL.to_vec())),
        any::<u64>(),
    )
        .prop_map(|(id, title, due_date, notes, priority, status, created)| Task {
            id: TaskId::new(id),
            title,
            due_date,
            notes,
            priority,
            status,
            created_at: Timestamp::from_millis(created),
        })
}

// --- Properties ---

proptest! {
    #[test]
    fn decode_never_panics(id in "[a-z]{1,8}", fields in arb_fields()) {
        let _ = decode_task(&Document { id, fields });
    }

    #[test]
    fn encode_decode_preserves_task(task in arb_task()) {
        let decoded = decode_task(&encode_task(&task)).unwrap();
        prop_assert_eq!(decoded, task);
    }

    #[test]
    fn normalized_title_is_trimmed_and_non_empty(title in ".{0,300}") {
        match TaskDraft::new(title.clone()).normalize(MAX_TASK_TITLE_LENGTH) {
            Ok(draft) => {
                prop_assert_eq!(draft.title.as_str(), title.trim());
                prop_assert!(!draft.title.is_empty());
                prop_assert!(draft.title.chars().count() <= MAX_TASK_TITLE_LENGTH);
            }
            Err(ValidationError::TitleEmpty) => {
                prop_assert!(title.trim().is_empty());
            }
            Err(ValidationError::TitleTooLong { len, max }) => {
                prop_assert!(len > max);
            }
            Err(other) => {
                prop_assert!(false, "unexpected error {}", other);
            }
        }
    }

    #[test]
    fn draft_write_never_carries_created_at(title in "[a-z]{1,20}") {
        let draft = TaskDraft::new(title).normalize(MAX_TASK_TITLE_LENGTH).unwrap();
        let write = draft_write(&draft);
        prop_assert!(!write.fields.contains_key(CREATED_AT));
        prop_assert!(write.server_timestamps.iter().any(|f| f == CREATED_AT));
    }
}
