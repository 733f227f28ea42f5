//! Task board coordinator.
//!
//! [`TaskBoard`] ties the identity provider, the live mirror and the view
//! parameters together. Front ends drive it with a single loop:
//!
//! ```text
//! identity ── principal change ──►  TaskBoard  ◄── SyncMessage ── store
//!                                       │
//!                                       ▼
//!                                   BoardEvent
//! ```
//!
//! A principal change always closes the current subscription before the
//! next one is opened, so no task from the previous scope survives the
//! switch.

use std::sync::Arc;

use tokio::sync::watch;

use taskdesk_proto::task::{MAX_TASK_TITLE_LENGTH, Task, TaskStatus};

use crate::identity::{IdentityProvider, PrincipalId};
use crate::store::{DocumentStore, TransportError};
use crate::tasks::{
    ChangeSummary, LiveMirror, MirrorEvent, MirrorState, MutationError, MutationGateway, ScopeKey,
    SortDirection, SortKey, SortSpec, SubscriptionHandle, ViewParams, derive_view,
};

/// Which collection the board follows for the signed-in principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoardMode {
    /// The principal's own `users/{id}/tasks` collection.
    #[default]
    Personal,
    /// The legacy shared `tasks` collection.
    Shared,
}

/// Events produced by [`TaskBoard::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// A sync message changed the mirror.
    Changed(ChangeSummary),
    /// The subscription (or opening one) failed. The last snapshot is kept.
    Degraded(TransportError),
    /// The mirror was reopened for a new scope; `None` means signed out.
    ScopeChanged(Option<ScopeKey>),
    /// The store ended the subscription.
    SubscriptionEnded,
}

enum Step {
    Principal,
    IdentityGone,
    Mirror(Option<MirrorEvent>),
}

/// Owns the live mirror and the view parameters for one front end.
pub struct TaskBoard<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
    principal_rx: watch::Receiver<Option<PrincipalId>>,
    watching_identity: bool,
    mirror: LiveMirror<S>,
    handle: Option<SubscriptionHandle>,
    params: ViewParams,
    mode: BoardMode,
    max_title_len: usize,
}

impl<S: DocumentStore, I: IdentityProvider> TaskBoard<S, I> {
    /// Creates a board. Nothing is subscribed until [`start`](Self::start).
    #[must_use]
    pub fn new(store: Arc<S>, identity: Arc<I>) -> Self {
        let principal_rx = identity.principal_changes();
        Self {
            mirror: LiveMirror::new(Arc::clone(&store)),
            store,
            identity,
            principal_rx,
            watching_identity: true,
            handle: None,
            params: ViewParams::default(),
            mode: BoardMode::default(),
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }

    /// Sets the initial view parameters.
    #[must_use]
    pub const fn with_view(mut self, params: ViewParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the initial mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: BoardMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the title length limit used by gateways from this board.
    #[must_use]
    pub const fn with_max_title_len(mut self, max: usize) -> Self {
        self.max_title_len = max;
        self
    }

    /// Opens the mirror for whoever is signed in right now.
    ///
    /// # Errors
    ///
    /// Returns the store's [`TransportError`] if the subscription cannot be
    /// opened.
    pub async fn start(&mut self) -> Result<Option<ScopeKey>, TransportError> {
        let principal = self.principal_rx.borrow_and_update().clone();
        self.reopen(principal).await
    }

    /// Scope the board is following, `None` when signed out.
    #[must_use]
    pub fn scope(&self) -> Option<&ScopeKey> {
        self.handle.as_ref().and_then(SubscriptionHandle::scope)
    }

    fn scope_for(&self, principal: Option<PrincipalId>) -> Option<ScopeKey> {
        let principal = principal?;
        Some(match self.mode {
            BoardMode::Personal => ScopeKey::User(principal),
            BoardMode::Shared => ScopeKey::Shared,
        })
    }

    async fn reopen(
        &mut self,
        principal: Option<PrincipalId>,
    ) -> Result<Option<ScopeKey>, TransportError> {
        if let Some(handle) = self.handle.take() {
            self.mirror.close(&handle);
        }
        let scope = self.scope_for(principal);
        let handle = self.mirror.open(scope).await?;
        let scope = handle.scope().cloned();
        match &scope {
            Some(key) => tracing::info!(scope = %key, "board following scope"),
            None => tracing::info!("board signed out"),
        }
        self.handle = Some(handle);
        Ok(scope)
    }

    /// Waits for the next thing that changes what the board shows.
    ///
    /// Principal changes reopen the mirror and yield
    /// [`BoardEvent::ScopeChanged`]. Returns `None` once neither the identity
    /// provider nor the subscription can produce anything further.
    pub async fn next_event(&mut self) -> Option<BoardEvent> {
        loop {
            let step = tokio::select! {
                // A principal change wins over anything queued for the old scope.
                biased;

                changed = self.principal_rx.changed(), if self.watching_identity => {
                    if changed.is_ok() { Step::Principal } else { Step::IdentityGone }
                }
                event = self.mirror.next_event(), if self.mirror.is_subscribed() => Step::Mirror(event),
                else => return None,
            };

            let event = match step {
                Step::Principal => {
                    let principal = self.principal_rx.borrow_and_update().clone();
                    match self.reopen(principal).await {
                        Ok(scope) => BoardEvent::ScopeChanged(scope),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to reopen mirror");
                            BoardEvent::Degraded(err)
                        }
                    }
                }
                Step::IdentityGone => {
                    tracing::debug!("identity provider closed; no further principal changes");
                    self.watching_identity = false;
                    continue;
                }
                Step::Mirror(Some(MirrorEvent::Applied(summary))) => BoardEvent::Changed(summary),
                Step::Mirror(Some(MirrorEvent::Degraded(err))) => BoardEvent::Degraded(err),
                Step::Mirror(Some(MirrorEvent::Ended) | None) => BoardEvent::SubscriptionEnded,
            };
            return Some(event);
        }
    }

    /// Switches between the personal and the shared collection, reopening
    /// the mirror if the mode actually changed.
    ///
    /// # Errors
    ///
    /// Returns the store's [`TransportError`] if the new subscription cannot
    /// be opened.
    pub async fn set_mode(&mut self, mode: BoardMode) -> Result<Option<ScopeKey>, TransportError> {
        if self.mode == mode {
            return Ok(self.scope().cloned());
        }
        self.mode = mode;
        let principal = self.identity.current_principal();
        self.reopen(principal).await
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> BoardMode {
        self.mode
    }

    /// Gateway writing to the current scope.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Unauthenticated`] when nobody is signed in.
    pub fn gateway(&self) -> Result<MutationGateway<S>, MutationError> {
        let scope = self.scope().ok_or(MutationError::Unauthenticated)?;
        Ok(MutationGateway::new(Arc::clone(&self.store), scope)
            .with_max_title_len(self.max_title_len))
    }

    /// The filtered, sorted view of the mirror.
    #[must_use]
    pub fn view(&self) -> Vec<&Task> {
        derive_view(&self.mirror.tasks(), &self.params)
    }

    /// Current view parameters.
    #[must_use]
    pub const fn params(&self) -> &ViewParams {
        &self.params
    }

    /// Filters the view by status, or clears the filter.
    pub fn set_status_filter(&mut self, status: Option<TaskStatus>) {
        self.params.status_filter = status;
    }

    /// Sorts the view by `key` in `direction`.
    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.params.sort = SortSpec::new(key, direction);
    }

    /// Selects `key` the way a clickable column header does.
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.params.sort = self.params.sort.toggled(key);
    }

    /// The underlying mirror.
    #[must_use]
    pub const fn mirror(&self) -> &LiveMirror<S> {
        &self.mirror
    }

    /// Mirror lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &MirrorState {
        self.mirror.state()
    }
}
