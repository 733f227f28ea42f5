//! Property-based tests for derived views.
//!
//! Uses proptest to verify:
//! 1. A status filter keeps exactly the tasks with that stored status.
//! 2. For title and due date, descending order is ascending order reversed.
//! 3. Tasks without a priority come last in both directions.
//! 4. Sorting only reorders: nothing is dropped or duplicated.
//! 5. A removed task never appears in any view.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use taskdesk::identity::PrincipalId;
use taskdesk::store::memory::MemoryStore;
use taskdesk::tasks::{
    LiveMirror, ScopeKey, SortDirection, SortKey, SortSpec, ViewParams, derive_view,
};
use taskdesk_proto::codec::encode_task;
use taskdesk_proto::document::{DocumentChange, SyncMessage};
use taskdesk_proto::task::{Priority, Task, TaskId, TaskStatus, Timestamp};

// --- Strategies ---

fn arb_priority() -> impl Strategy<Value = Option<Priority>> {
    prop::option::of(prop::sample::select(Priority::ALL.to_vec()))
}

fn arb_status() -> impl Strategy<Value = Option<TaskStatus>> {
    prop::option::of(prop::sample::select(TaskStatus::ALL.to_vec()))
}

fn arb_due_date() -> impl Strategy<Value = Option<String>> {
    prop::option::of((2020u32..2030, 1u32..=12, 1u32..=28))
        .prop_map(|d| d.map(|(y, m, day)| format!("{y:04}-{m:02}-{day:02}")))
}

/// Tasks with unique ids; titles drawn from a small alphabet so ties occur.
fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        (
            "[a-cA-C ]{0,4}",
            arb_due_date(),
            arb_priority(),
            arb_status(),
            0u64..50,
        ),
        0..24,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (title, due_date, priority, status, created))| Task {
                id: TaskId::new(format!("t{i:03}")),
                title,
                due_date,
                notes: None,
                priority,
                status,
                created_at: Timestamp::from_millis(created),
            })
            .collect()
    })
}

fn arb_sort_key() -> impl Strategy<Value = SortKey> {
    prop::sample::select(vec![
        SortKey::None,
        SortKey::Title,
        SortKey::DueDate,
        SortKey::Priority,
    ])
}

// --- Helpers ---

fn baseline(tasks: &[Task]) -> Vec<&Task> {
    let mut refs: Vec<&Task> = tasks.iter().collect();
    refs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    refs
}

fn view_of<'a>(tasks: &[&'a Task], key: SortKey, direction: SortDirection) -> Vec<&'a Task> {
    derive_view(
        tasks,
        &ViewParams {
            status_filter: None,
            sort: SortSpec::new(key, direction),
        },
    )
}

fn ids(tasks: &[&Task]) -> Vec<String> {
    tasks.iter().map(|t| t.id.to_string()).collect()
}

// --- Properties ---

proptest! {
    #[test]
    fn filter_keeps_exactly_matching_status(
        tasks in arb_tasks(),
        status in prop::sample::select(TaskStatus::ALL.to_vec()),
    ) {
        let base = baseline(&tasks);
        let params = ViewParams { status_filter: Some(status), sort: SortSpec::default() };
        let view = derive_view(&base, &params);

        prop_assert!(view.iter().all(|t| t.status == Some(status)));
        let expected = tasks.iter().filter(|t| t.status == Some(status)).count();
        prop_assert_eq!(view.len(), expected);
    }

    #[test]
    fn text_keys_descending_is_ascending_reversed(
        tasks in arb_tasks(),
        key in prop::sample::select(vec![SortKey::Title, SortKey::DueDate]),
    ) {
        let base = baseline(&tasks);
        let mut asc = ids(&view_of(&base, key, SortDirection::Asc));
        let desc = ids(&view_of(&base, key, SortDirection::Desc));
        asc.reverse();
        prop_assert_eq!(asc, desc);
    }

    #[test]
    fn ascending_text_sort_is_ordered(tasks in arb_tasks()) {
        let base = baseline(&tasks);
        let view = view_of(&base, SortKey::Title, SortDirection::Asc);
        prop_assert!(view.windows(2).all(|w| w[0].title <= w[1].title));
    }

    #[test]
    fn unset_priority_sorts_last(
        tasks in arb_tasks(),
        direction in prop::sample::select(vec![SortDirection::Asc, SortDirection::Desc]),
    ) {
        let base = baseline(&tasks);
        let view = view_of(&base, SortKey::Priority, direction);
        let first_unset = view.iter().position(|t| t.priority.is_none()).unwrap_or(view.len());
        prop_assert!(view[first_unset..].iter().all(|t| t.priority.is_none()));

        let ranks: Vec<u8> = view[..first_unset]
            .iter()
            .filter_map(|t| t.priority.map(Priority::rank))
            .collect();
        match direction {
            SortDirection::Asc => {
                prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
            }
            SortDirection::Desc => {
                prop_assert!(ranks.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn sorting_is_a_permutation(
        tasks in arb_tasks(),
        key in arb_sort_key(),
        direction in prop::sample::select(vec![SortDirection::Asc, SortDirection::Desc]),
    ) {
        let base = baseline(&tasks);
        let view = view_of(&base, key, direction);
        let mut sorted_ids = ids(&view);
        let mut base_ids = ids(&base);
        sorted_ids.sort();
        base_ids.sort();
        prop_assert_eq!(sorted_ids, base_ids);
    }

    #[test]
    fn no_sort_key_keeps_baseline(tasks in arb_tasks()) {
        let base = baseline(&tasks);
        prop_assert_eq!(ids(&view_of(&base, SortKey::None, SortDirection::Desc)), ids(&base));
    }

    #[test]
    fn removed_tasks_never_appear(
        tasks in arb_tasks(),
        remove_mask in prop::collection::vec(any::<bool>(), 24),
        key in arb_sort_key(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let scope = ScopeKey::User(PrincipalId::new("prop"));
        let mut mirror = LiveMirror::new(Arc::new(MemoryStore::new()));
        runtime.block_on(mirror.open(Some(scope.clone()))).unwrap();

        mirror.apply(&SyncMessage::Changes {
            collection: scope.collection(),
            changes: tasks.iter().map(|t| DocumentChange::Added(encode_task(t))).collect(),
        });
        let removed: HashSet<String> = tasks
            .iter()
            .zip(&remove_mask)
            .filter(|(_, remove)| **remove)
            .map(|(t, _)| t.id.to_string())
            .collect();
        mirror.apply(&SyncMessage::Changes {
            collection: scope.collection(),
            changes: removed.iter().map(|id| DocumentChange::Removed { id: id.clone() }).collect(),
        });

        prop_assert_eq!(mirror.len(), tasks.len() - removed.len());
        let view = view_of(&mirror.tasks(), key, SortDirection::Asc);
        prop_assert!(view.iter().all(|t| !removed.contains(t.id.as_str())));
    }
}
