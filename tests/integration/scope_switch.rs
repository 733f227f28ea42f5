//! Integration tests for principal and scope changes.
//!
//! A principal change must close the old subscription before the new one
//! opens, and nothing mirrored for the previous principal may remain
//! visible afterwards.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::sync::Arc;
use std::time::Duration;

use taskdesk::board::{BoardEvent, BoardMode, TaskBoard};
use taskdesk::identity::{LocalIdentity, PrincipalId};
use taskdesk::store::memory::MemoryStore;
use taskdesk::tasks::{LiveMirror, MirrorState, MutationError, MutationGateway, ScopeKey};
use taskdesk_proto::task::TaskDraft;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn user(name: &str) -> ScopeKey {
    ScopeKey::User(PrincipalId::new(name))
}

/// Writes a task straight into `scope` through its own gateway.
async fn create_in(store: &Arc<MemoryStore>, scope: &ScopeKey, title: &str) {
    MutationGateway::new(Arc::clone(store), scope)
        .create(&TaskDraft::new(title))
        .await
        .unwrap();
}

/// Pulls board events until the mirror has applied a full state.
async fn settle(board: &mut TaskBoard<MemoryStore, LocalIdentity>) {
    loop {
        match board.next_event().await.expect("board still running") {
            BoardEvent::Changed(summary) if summary.replaced => return,
            _ => {}
        }
    }
}

fn titles(board: &TaskBoard<MemoryStore, LocalIdentity>) -> Vec<String> {
    board.view().iter().map(|t| t.title.clone()).collect()
}

// ---------------------------------------------------------------------------
// Principal switches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn switching_principal_shows_only_new_principals_tasks() {
    let store = Arc::new(MemoryStore::new());
    create_in(&store, &user("alice"), "alice's task").await;
    create_in(&store, &user("bob"), "bob's task").await;

    let identity = Arc::new(LocalIdentity::signed_in(PrincipalId::new("alice")));
    let mut board = TaskBoard::new(Arc::clone(&store), Arc::clone(&identity));
    board.start().await.unwrap();
    settle(&mut board).await;
    assert_eq!(titles(&board), vec!["alice's task"]);

    identity.sign_in(PrincipalId::new("bob"));
    let event = board.next_event().await.unwrap();
    assert_eq!(event, BoardEvent::ScopeChanged(Some(user("bob"))));
    assert!(board.view().is_empty(), "old snapshot cleared before new data");

    settle(&mut board).await;
    assert_eq!(titles(&board), vec!["bob's task"]);
    assert_eq!(store.subscriber_count(&user("alice").collection()), 0);
    assert_eq!(store.subscriber_count(&user("bob").collection()), 1);
}

#[tokio::test]
async fn late_writes_to_old_scope_never_reach_new_view() {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(LocalIdentity::signed_in(PrincipalId::new("alice")));
    let mut board = TaskBoard::new(Arc::clone(&store), Arc::clone(&identity));
    board.start().await.unwrap();
    settle(&mut board).await;

    // Queued on alice's subscription but not yet applied.
    create_in(&store, &user("alice"), "in flight").await;

    identity.sign_in(PrincipalId::new("bob"));
    assert!(matches!(
        board.next_event().await.unwrap(),
        BoardEvent::ScopeChanged(_)
    ));
    settle(&mut board).await;
    assert_eq!(store.subscriber_count(&user("alice").collection()), 0);
    create_in(&store, &user("alice"), "after switch").await;

    let pending = tokio::time::timeout(Duration::from_millis(200), board.next_event()).await;
    assert!(pending.is_err(), "no event for a write to the old scope");
    assert!(board.view().is_empty());
    assert_eq!(board.mirror().len(), 0);
}

#[tokio::test]
async fn logout_leaves_board_unauthenticated() {
    let store = Arc::new(MemoryStore::new());
    create_in(&store, &user("alice"), "private").await;
    let identity = Arc::new(LocalIdentity::signed_in(PrincipalId::new("alice")));
    let mut board = TaskBoard::new(Arc::clone(&store), Arc::clone(&identity));
    board.start().await.unwrap();
    settle(&mut board).await;

    identity.sign_out();
    assert_eq!(
        board.next_event().await.unwrap(),
        BoardEvent::ScopeChanged(None)
    );

    assert_eq!(board.state(), &MirrorState::Unauthenticated);
    assert!(board.view().is_empty());
    assert!(matches!(
        board.gateway(),
        Err(MutationError::Unauthenticated)
    ));
}

#[tokio::test]
async fn sign_in_after_start_opens_subscription() {
    let store = Arc::new(MemoryStore::new());
    create_in(&store, &user("carol"), "waiting").await;
    let identity = Arc::new(LocalIdentity::new());
    let mut board = TaskBoard::new(Arc::clone(&store), Arc::clone(&identity));
    board.start().await.unwrap();
    assert_eq!(board.state(), &MirrorState::Unauthenticated);

    identity.sign_in(PrincipalId::new("carol"));
    assert_eq!(
        board.next_event().await.unwrap(),
        BoardEvent::ScopeChanged(Some(user("carol")))
    );
    settle(&mut board).await;
    assert_eq!(titles(&board), vec!["waiting"]);
}

// ---------------------------------------------------------------------------
// Shared collection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shared_mode_reads_and_writes_legacy_collection() {
    let store = Arc::new(MemoryStore::new());
    create_in(&store, &ScopeKey::Shared, "team task").await;
    create_in(&store, &user("alice"), "mine").await;

    let identity = Arc::new(LocalIdentity::signed_in(PrincipalId::new("alice")));
    let mut board = TaskBoard::new(Arc::clone(&store), Arc::clone(&identity))
        .with_mode(BoardMode::Shared);
    board.start().await.unwrap();
    settle(&mut board).await;
    assert_eq!(titles(&board), vec!["team task"]);

    board
        .gateway()
        .unwrap()
        .create(&TaskDraft::new("another team task"))
        .await
        .unwrap();
    assert!(matches!(
        board.next_event().await.unwrap(),
        BoardEvent::Changed(s) if s.added == 1
    ));
    assert_eq!(store.documents(&ScopeKey::Shared.collection()).len(), 2);

    board.set_mode(BoardMode::Personal).await.unwrap();
    settle(&mut board).await;
    assert_eq!(titles(&board), vec!["mine"]);
}

// ---------------------------------------------------------------------------
// Mirror handles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_handle_cannot_close_newer_subscription() {
    let store = Arc::new(MemoryStore::new());
    let mut mirror = LiveMirror::new(Arc::clone(&store));
    let old = mirror.open(Some(user("alice"))).await.unwrap();
    let new = mirror.open(Some(user("bob"))).await.unwrap();

    assert!(!mirror.close(&old));
    assert!(mirror.is_subscribed());
    assert_eq!(mirror.scope(), Some(&user("bob")));

    assert!(mirror.close(&new));
    assert_eq!(mirror.state(), &MirrorState::Closed);
    assert!(mirror.next_event().await.is_none());
}
