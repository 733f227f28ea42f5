//! Document store boundary.
//!
//! Defines the [`DocumentStore`] trait that the hosted backend SDK is wrapped
//! behind. Concrete implementations include:
//! - [`memory::MemoryStore`]: in-process store used by tests and the console

pub mod memory;

use std::future::Future;

use tokio::sync::mpsc;

use taskdesk_proto::document::{CollectionPath, DocPath, DocumentWrite, SyncMessage};

/// Errors that can occur when talking to the document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection to the backend has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The operation timed out before completing.
    #[error("store operation timed out")]
    Timeout,

    /// The backend rejected the call for the current principal.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The target document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The backend is unavailable (network, quota).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One item delivered on a subscription: a sync message, or a transport
/// error after which the stream may resume with a fresh full state.
pub type SubscriptionItem = Result<SyncMessage, TransportError>;

/// Live subscription to one collection.
///
/// Dropping or [closing](Subscription::close) the subscription stops
/// delivery; nothing already queued is applied afterwards by its owner.
#[derive(Debug)]
pub struct Subscription {
    collection: CollectionPath,
    rx: mpsc::UnboundedReceiver<SubscriptionItem>,
}

impl Subscription {
    /// Wraps the receiving half of a subscription channel.
    #[must_use]
    pub const fn new(
        collection: CollectionPath,
        rx: mpsc::UnboundedReceiver<SubscriptionItem>,
    ) -> Self {
        Self { collection, rx }
    }

    /// Collection this subscription listens to.
    #[must_use]
    pub const fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Waits for the next item. Returns `None` once the store side is gone.
    pub async fn next(&mut self) -> Option<SubscriptionItem> {
        self.rx.recv().await
    }

    /// Stops the subscription, discarding anything still queued.
    pub fn close(mut self) {
        self.rx.close();
    }
}

/// Async document store with live collection subscriptions.
///
/// Mirrors the surface of a hosted document database SDK: writes are
/// fire-and-confirm, and their effects are observed through subscriptions
/// rather than through the write call's return value.
pub trait DocumentStore: Send + Sync {
    /// Subscribe to a collection ordered by creation time.
    ///
    /// The first item delivered is a [`SyncMessage::FullState`].
    fn subscribe(
        &self,
        collection: &CollectionPath,
    ) -> impl Future<Output = Result<Subscription, TransportError>> + Send;

    /// Add a document with a store-assigned id, returning that id.
    fn add(
        &self,
        collection: &CollectionPath,
        write: DocumentWrite,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Write fields to a document.
    ///
    /// With `merge`, only the given fields change and the document must
    /// already exist. Without it, the document is replaced or created.
    fn set(
        &self,
        doc: &DocPath,
        write: DocumentWrite,
        merge: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Delete a document. Deleting a missing document succeeds.
    fn delete(&self, doc: &DocPath) -> impl Future<Output = Result<(), TransportError>> + Send;
}
