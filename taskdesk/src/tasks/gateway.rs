//! Mutation gateway: turns task edits into document store writes.
//!
//! The gateway validates locally, then writes. It never reads or updates a
//! mirror: the effect of a successful call shows up later, through the
//! collection subscription.

use std::sync::Arc;

use taskdesk_proto::codec::{draft_write, patch_write};
use taskdesk_proto::document::CollectionPath;
use taskdesk_proto::task::{
    MAX_TASK_TITLE_LENGTH, TaskDraft, TaskId, TaskPatch, TaskStatus, ValidationError,
};

use super::ScopeKey;
use crate::store::{DocumentStore, TransportError};

/// Errors returned by gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Local validation failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The store rejected or failed the write.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No principal is signed in, so there is no collection to write to.
    #[error("not signed in")]
    Unauthenticated,
}

/// Issues task writes against one collection.
pub struct MutationGateway<S> {
    store: Arc<S>,
    collection: CollectionPath,
    max_title_len: usize,
}

impl<S> Clone for MutationGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            max_title_len: self.max_title_len,
        }
    }
}

impl<S: DocumentStore> MutationGateway<S> {
    /// Creates a gateway writing to the collection for `scope`.
    #[must_use]
    pub fn new(store: Arc<S>, scope: &ScopeKey) -> Self {
        Self {
            store,
            collection: scope.collection(),
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }

    /// Overrides the maximum title length.
    #[must_use]
    pub const fn with_max_title_len(mut self, max: usize) -> Self {
        self.max_title_len = max;
        self
    }

    /// Collection this gateway writes to.
    #[must_use]
    pub const fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Creates a task. `createdAt` is assigned by the store.
    ///
    /// Returns the store-assigned id. The new task reaches mirrors through
    /// their subscriptions, not through this call.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Validation`] without contacting the store if
    /// the draft is invalid, or [`MutationError::Transport`] if the write fails.
    pub async fn create(&self, draft: &TaskDraft) -> Result<TaskId, MutationError> {
        let draft = draft.normalize(self.max_title_len)?;
        let id = self
            .store
            .add(&self.collection, draft_write(&draft))
            .await
            .inspect_err(|err| {
                tracing::warn!(collection = %self.collection, error = %err, "task create failed");
            })?;
        tracing::debug!(collection = %self.collection, id = %id, "task created");
        Ok(TaskId::new(id))
    }

    /// Updates the fields present in `patch`, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Validation`] without contacting the store if
    /// the patch is empty or invalid, or [`MutationError::Transport`] if the
    /// write fails (including a missing document).
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), MutationError> {
        let patch = patch.normalize(self.max_title_len)?;
        let doc = self.collection.doc(id.as_str());
        self.store
            .set(&doc, patch_write(&patch), true)
            .await
            .inspect_err(|err| tracing::warn!(doc = %doc, error = %err, "task update failed"))?;
        tracing::debug!(doc = %doc, "task updated");
        Ok(())
    }

    /// Changes only the status of a task.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Transport`] if the write fails.
    pub async fn set_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), MutationError> {
        self.update(id, &TaskPatch::status(status)).await
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::Transport`] if the delete fails.
    pub async fn delete(&self, id: &TaskId) -> Result<(), MutationError> {
        let doc = self.collection.doc(id.as_str());
        self.store
            .delete(&doc)
            .await
            .inspect_err(|err| tracing::warn!(doc = %doc, error = %err, "task delete failed"))?;
        tracing::debug!(doc = %doc, "task deleted");
        Ok(())
    }
}
