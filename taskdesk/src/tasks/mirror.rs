//! Local mirror of a remote task collection.
//!
//! `LiveMirror` is a fold over a store [`Subscription`]: each
//! [`SyncMessage`] is applied in arrival order to a map keyed by task id.
//! The mirror never originates field values; it only replaces what it holds
//! with what the store pushed.

use std::collections::HashMap;
use std::sync::Arc;

use taskdesk_proto::codec::decode_task;
use taskdesk_proto::document::{Document, DocumentChange, SyncMessage};
use taskdesk_proto::task::{Task, TaskId};

use super::ScopeKey;
use crate::store::{DocumentStore, Subscription, TransportError};

/// Lifecycle state of a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// No subscription has been opened, or it was closed.
    Closed,
    /// Opened without a signed-in principal. The mirror is empty and no
    /// subscription exists.
    Unauthenticated,
    /// Subscribed and receiving changes.
    Live,
    /// The subscription reported an error; the last snapshot is kept until
    /// the store replays full state.
    Degraded(TransportError),
}

/// Token returned by [`LiveMirror::open`]. Closing with a stale handle is a
/// no-op, so a late close from a previous scope cannot tear down a newer
/// subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    generation: u64,
    scope: Option<ScopeKey>,
}

impl SubscriptionHandle {
    /// Scope this handle was opened for, `None` when unauthenticated.
    #[must_use]
    pub const fn scope(&self) -> Option<&ScopeKey> {
        self.scope.as_ref()
    }
}

/// Counts of what one applied message changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Records inserted.
    pub added: usize,
    /// Records replaced.
    pub modified: usize,
    /// Records removed.
    pub removed: usize,
    /// Documents that could not be decoded and were ignored.
    pub skipped: usize,
    /// Whether the message replaced the whole collection.
    pub replaced: bool,
}

impl ChangeSummary {
    /// Returns `true` if the message changed nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.replaced && self.added == 0 && self.modified == 0 && self.removed == 0
    }
}

/// What happened when the mirror consumed one subscription item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// A sync message was applied.
    Applied(ChangeSummary),
    /// The subscription reported a transport error. Non-fatal.
    Degraded(TransportError),
    /// The store closed the subscription; no further events will arrive.
    Ended,
}

/// Keyed, read-only copy of one remote task collection.
pub struct LiveMirror<S> {
    store: Arc<S>,
    tasks: HashMap<TaskId, Task>,
    subscription: Option<Subscription>,
    scope: Option<ScopeKey>,
    state: MirrorState,
    generation: u64,
}

impl<S: DocumentStore> LiveMirror<S> {
    /// Creates a closed, empty mirror over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            tasks: HashMap::new(),
            subscription: None,
            scope: None,
            state: MirrorState::Closed,
            generation: 0,
        }
    }

    /// Starts mirroring the collection for `scope`.
    ///
    /// Any previous subscription is closed and the snapshot cleared first.
    /// With no scope (nobody signed in) the mirror enters
    /// [`MirrorState::Unauthenticated`] and stays empty.
    ///
    /// # Errors
    ///
    /// Returns the store's [`TransportError`] if the subscription cannot be
    /// established; the mirror is left closed and empty.
    pub async fn open(
        &mut self,
        scope: Option<ScopeKey>,
    ) -> Result<SubscriptionHandle, TransportError> {
        self.release();
        self.generation += 1;
        self.scope = None;
        self.state = MirrorState::Closed;

        let Some(key) = scope else {
            tracing::info!("no principal signed in; mirror left unauthenticated");
            self.state = MirrorState::Unauthenticated;
            return Ok(self.handle());
        };

        let subscription = self.store.subscribe(&key.collection()).await?;
        tracing::info!(scope = %key, collection = %subscription.collection(), "mirror opened");
        self.subscription = Some(subscription);
        self.scope = Some(key);
        self.state = MirrorState::Live;
        Ok(self.handle())
    }

    /// Stops mirroring and clears the snapshot.
    ///
    /// Returns `false` (and does nothing) if `handle` is not the most recent
    /// one returned by [`open`](Self::open). Once this returns `true`, no
    /// further change is applied until the next `open`.
    pub fn close(&mut self, handle: &SubscriptionHandle) -> bool {
        if handle.generation != self.generation {
            return false;
        }
        self.release();
        self.scope = None;
        self.state = MirrorState::Closed;
        true
    }

    fn release(&mut self) {
        if let Some(sub) = self.subscription.take() {
            tracing::debug!(collection = %sub.collection(), "mirror subscription closed");
            sub.close();
        }
        self.tasks.clear();
    }

    fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            generation: self.generation,
            scope: self.scope.clone(),
        }
    }

    /// Returns `true` while a subscription is attached.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Waits for the next subscription item and applies it.
    ///
    /// Returns `None` immediately when no subscription is attached.
    pub async fn next_event(&mut self) -> Option<MirrorEvent> {
        let item = self.subscription.as_mut()?.next().await;
        let event = match item {
            Some(Ok(msg)) => MirrorEvent::Applied(self.apply(&msg)),
            Some(Err(err)) => {
                tracing::warn!(error = %err, held = self.tasks.len(), "sync degraded; keeping last snapshot");
                self.state = MirrorState::Degraded(err.clone());
                MirrorEvent::Degraded(err)
            }
            None => {
                tracing::warn!("store closed the subscription");
                self.subscription = None;
                self.state = MirrorState::Degraded(TransportError::ConnectionClosed);
                MirrorEvent::Ended
            }
        };
        Some(event)
    }
}

impl<S> LiveMirror<S> {
    /// Applies one sync message.
    ///
    /// Messages for a collection other than the current scope's are ignored.
    /// Added and modified changes upsert by id, so re-applying a change is a
    /// no-op; removing an unknown id is a no-op. A full state replaces
    /// everything held and clears a degraded state.
    pub fn apply(&mut self, msg: &SyncMessage) -> ChangeSummary {
        let expected = self.scope.as_ref().map(ScopeKey::collection);
        if expected.as_ref() != Some(msg.collection()) {
            tracing::warn!(
                collection = %msg.collection(),
                "ignoring sync message for a collection outside the mirror scope"
            );
            return ChangeSummary::default();
        }

        let mut summary = ChangeSummary::default();
        match msg {
            SyncMessage::FullState { documents, .. } => {
                self.tasks.clear();
                for doc in documents {
                    if let Some(task) = decode_or_skip(doc) {
                        self.tasks.insert(task.id.clone(), task);
                        summary.added += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
                summary.replaced = true;
                if matches!(self.state, MirrorState::Degraded(_)) {
                    tracing::info!(records = self.tasks.len(), "sync restored from full state");
                }
                self.state = MirrorState::Live;
            }
            SyncMessage::Changes { changes, .. } => {
                for change in changes {
                    self.apply_change(change, &mut summary);
                }
            }
        }
        tracing::debug!(?summary, total = self.tasks.len(), "applied sync message");
        summary
    }

    fn apply_change(&mut self, change: &DocumentChange, summary: &mut ChangeSummary) {
        match change {
            DocumentChange::Added(doc) | DocumentChange::Modified(doc) => {
                let Some(task) = decode_or_skip(doc) else {
                    // A document that no longer decodes must not linger with stale fields.
                    self.tasks.remove(&TaskId::new(doc.id.clone()));
                    summary.skipped += 1;
                    return;
                };
                if self.tasks.insert(task.id.clone(), task).is_some() {
                    summary.modified += 1;
                } else {
                    summary.added += 1;
                }
            }
            DocumentChange::Removed { id } => {
                if self.tasks.remove(&TaskId::new(id.clone())).is_some() {
                    summary.removed += 1;
                } else {
                    tracing::debug!(id = %id, "removal for unknown task ignored");
                }
            }
        }
    }

    /// Tasks in baseline order: creation time ascending, ties by id.
    #[must_use]
    pub fn tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        tasks
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Number of mirrored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no task is mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &MirrorState {
        &self.state
    }

    /// Scope of the current (or last opened) subscription.
    #[must_use]
    pub const fn scope(&self) -> Option<&ScopeKey> {
        self.scope.as_ref()
    }
}

fn decode_or_skip(doc: &Document) -> Option<Task> {
    match decode_task(doc) {
        Ok(task) => Some(task),
        Err(err) => {
            tracing::warn!(error = %err, "skipping undecodable task document");
            None
        }
    }
}
