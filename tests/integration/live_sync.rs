//! Integration tests for the live task list.
//!
//! Drives the mutation gateway and the live mirror against the in-memory
//! document store and checks that every write reaches the mirror only
//! through the subscription.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::redundant_clone
)]

use std::sync::Arc;

use serde_json::json;
use taskdesk::identity::PrincipalId;
use taskdesk::store::TransportError;
use taskdesk::store::memory::MemoryStore;
use taskdesk::tasks::{
    LiveMirror, MirrorEvent, MirrorState, MutationError, MutationGateway, ScopeKey, SortDirection,
    SortKey, SortSpec, ViewParams, derive_view,
};
use taskdesk_proto::document::Document;
use taskdesk_proto::task::{Priority, TaskDraft, TaskId, TaskPatch, TaskStatus, ValidationError};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn alice() -> ScopeKey {
    ScopeKey::User(PrincipalId::new("alice"))
}

/// Opens a mirror and gateway on alice's list and consumes the initial
/// full state.
async fn setup() -> (
    Arc<MemoryStore>,
    LiveMirror<MemoryStore>,
    MutationGateway<MemoryStore>,
) {
    let store = Arc::new(MemoryStore::new());
    let mut mirror = LiveMirror::new(Arc::clone(&store));
    mirror.open(Some(alice())).await.unwrap();
    let initial = mirror.next_event().await.unwrap();
    assert!(matches!(initial, MirrorEvent::Applied(s) if s.replaced));
    let gateway = MutationGateway::new(Arc::clone(&store), &alice());
    (store, mirror, gateway)
}

/// Applies one pushed message and returns the event.
async fn pump(mirror: &mut LiveMirror<MemoryStore>) -> MirrorEvent {
    mirror.next_event().await.expect("subscription attached")
}

// ---------------------------------------------------------------------------
// Create → push round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_task_appears_only_after_push() {
    let (_store, mut mirror, gateway) = setup().await;

    let id = gateway
        .create(
            &TaskDraft::new("Buy milk")
                .with_due_date("2024-05-01")
                .with_notes("2%")
                .with_priority(Priority::High)
                .with_status(TaskStatus::Pending),
        )
        .await
        .unwrap();
    assert!(mirror.is_empty(), "the gateway never writes the mirror");

    let event = pump(&mut mirror).await;
    assert!(matches!(event, MirrorEvent::Applied(s) if s.added == 1));

    let task = mirror.get(&id).expect("pushed task is mirrored");
    assert_eq!(task.title, "Buy milk");
    assert_eq!(task.due_date.as_deref(), Some("2024-05-01"));
    assert_eq!(task.notes.as_deref(), Some("2%"));
    assert_eq!(task.priority, Some(Priority::High));
    assert_eq!(task.status, Some(TaskStatus::Pending));
    assert!(task.created_at.as_millis() > 0);
}

#[tokio::test]
async fn whitespace_title_is_rejected_without_a_call() {
    let (store, mirror, gateway) = setup().await;

    let err = gateway.create(&TaskDraft::new("   ")).await.unwrap_err();

    assert_eq!(err, MutationError::Validation(ValidationError::TitleEmpty));
    assert_eq!(store.call_count(), 0);
    assert!(mirror.is_empty());
}

#[tokio::test]
async fn invalid_due_date_is_rejected_locally() {
    let (store, _mirror, gateway) = setup().await;

    let err = gateway
        .create(&TaskDraft::new("x").with_due_date("2024-13-45"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MutationError::Validation(ValidationError::InvalidDueDate(_))
    ));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn creation_order_is_baseline_order() {
    let (_store, mut mirror, gateway) = setup().await;

    for title in ["first", "second", "third"] {
        gateway.create(&TaskDraft::new(title)).await.unwrap();
        pump(&mut mirror).await;
    }

    let titles: Vec<&str> = mirror.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
}

// ---------------------------------------------------------------------------
// Update and delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_change_is_pushed_and_filtered() {
    let (_store, mut mirror, gateway) = setup().await;
    let a = gateway
        .create(&TaskDraft::new("a").with_status(TaskStatus::Pending))
        .await
        .unwrap();
    let b = gateway
        .create(&TaskDraft::new("b").with_status(TaskStatus::Pending))
        .await
        .unwrap();
    pump(&mut mirror).await;
    pump(&mut mirror).await;

    gateway.set_status(&b, TaskStatus::Completed).await.unwrap();
    let event = pump(&mut mirror).await;
    assert!(matches!(event, MirrorEvent::Applied(s) if s.modified == 1));

    let params = ViewParams {
        status_filter: Some(TaskStatus::Pending),
        sort: SortSpec::default(),
    };
    let view = derive_view(&mirror.tasks(), &params);
    let ids: Vec<&TaskId> = view.iter().map(|t| &t.id).collect();
    assert_eq!(ids, vec![&a]);
}

#[tokio::test]
async fn full_edit_rewrites_every_field() {
    let (_store, mut mirror, gateway) = setup().await;
    let id = gateway
        .create(
            &TaskDraft::new("Draft")
                .with_notes("old notes")
                .with_due_date("2024-01-01"),
        )
        .await
        .unwrap();
    pump(&mut mirror).await;

    let edited = TaskDraft::new("Final")
        .with_priority(Priority::Low)
        .with_status(TaskStatus::InProgress);
    gateway.update(&id, &TaskPatch::full(edited)).await.unwrap();
    pump(&mut mirror).await;

    let task = mirror.get(&id).unwrap();
    assert_eq!(task.title, "Final");
    assert_eq!(task.notes, None);
    assert_eq!(task.due_date, None);
    assert_eq!(task.priority, Some(Priority::Low));
    assert_eq!(task.status, Some(TaskStatus::InProgress));
}

#[tokio::test]
async fn delete_then_query_yields_absence() {
    let (_store, mut mirror, gateway) = setup().await;
    let id = gateway.create(&TaskDraft::new("doomed")).await.unwrap();
    pump(&mut mirror).await;

    gateway.delete(&id).await.unwrap();
    let event = pump(&mut mirror).await;

    assert!(matches!(event, MirrorEvent::Applied(s) if s.removed == 1));
    assert!(mirror.get(&id).is_none());
    let all = derive_view(&mirror.tasks(), &ViewParams::default());
    assert!(all.iter().all(|t| t.id != id));
}

#[tokio::test]
async fn repeated_identical_update_is_idempotent() {
    let (_store, mut mirror, gateway) = setup().await;
    let id = gateway.create(&TaskDraft::new("same")).await.unwrap();
    pump(&mut mirror).await;

    let patch = TaskPatch::default().with_notes("note");
    gateway.update(&id, &patch).await.unwrap();
    pump(&mut mirror).await;
    let once = mirror.get(&id).cloned();
    gateway.update(&id, &patch).await.unwrap();
    pump(&mut mirror).await;

    assert_eq!(mirror.get(&id).cloned(), once);
    assert_eq!(mirror.len(), 1);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_leaves_mirror_unchanged() {
    let (store, mut mirror, gateway) = setup().await;
    let id = gateway.create(&TaskDraft::new("kept")).await.unwrap();
    pump(&mut mirror).await;
    let before: Vec<_> = mirror.tasks().into_iter().cloned().collect();

    store.fail_next_write(TransportError::PermissionDenied("rules".to_string()));
    let err = gateway
        .set_status(&id, TaskStatus::Completed)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MutationError::Transport(TransportError::PermissionDenied(_))
    ));
    let after: Vec<_> = mirror.tasks().into_iter().cloned().collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn subscription_drop_degrades_then_full_state_restores() {
    let (store, mut mirror, gateway) = setup().await;
    gateway.create(&TaskDraft::new("one")).await.unwrap();
    pump(&mut mirror).await;

    store.disconnect(&alice().collection());
    let event = pump(&mut mirror).await;
    assert_eq!(
        event,
        MirrorEvent::Degraded(TransportError::ConnectionClosed)
    );
    assert_eq!(mirror.len(), 1, "last snapshot is kept while degraded");

    // A write made by someone else while we were disconnected.
    store.seed(
        &alice().collection(),
        Document {
            id: "remote".to_string(),
            fields: json!({
                "title": "from another device",
                "createdAt": 9_999_999_999_999_u64,
            })
            .as_object()
            .cloned()
            .unwrap(),
        },
    );
    store.reconnect(&alice().collection());

    let event = pump(&mut mirror).await;
    assert!(matches!(event, MirrorEvent::Applied(s) if s.replaced && s.added == 2));
    assert_eq!(mirror.state(), &MirrorState::Live);
    let titles: Vec<&str> = mirror.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["one", "from another device"]);
}

#[tokio::test]
async fn legacy_document_without_status_or_priority_is_mirrored() {
    let (store, mut mirror, _gateway) = setup().await;
    store.seed(
        &alice().collection(),
        Document {
            id: "legacy".to_string(),
            fields: json!({
                "title": "old task",
                "dueDate": "",
                "createdAt": 5,
            })
            .as_object()
            .cloned()
            .unwrap(),
        },
    );
    pump(&mut mirror).await;

    let task = mirror.get(&TaskId::new("legacy")).unwrap();
    assert_eq!(task.status, None);
    assert_eq!(task.effective_status(), TaskStatus::Pending);
    assert_eq!(task.due_date, None);

    let params = ViewParams {
        status_filter: Some(TaskStatus::Pending),
        sort: SortSpec::new(SortKey::Priority, SortDirection::Asc),
    };
    assert!(derive_view(&mirror.tasks(), &params).is_empty());
}
