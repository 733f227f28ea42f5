//! In-process document store.
//!
//! [`MemoryStore`] keeps collections in memory and fans change batches out to
//! subscribers over unbounded [`tokio::sync::mpsc`] channels, the way a
//! hosted SDK invokes snapshot listeners. It also exposes fault injection
//! (dropped subscriptions, failing writes) so callers can exercise their
//! degraded paths.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use taskdesk_proto::codec::CREATED_AT;
use taskdesk_proto::document::{
    CollectionPath, DocPath, Document, DocumentChange, DocumentWrite, Fields, SyncMessage,
};

use super::{DocumentStore, Subscription, SubscriptionItem, TransportError};

struct Subscriber {
    collection: CollectionPath,
    tx: mpsc::UnboundedSender<SubscriptionItem>,
    connected: bool,
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<CollectionPath, HashMap<String, Fields>>,
    subscribers: Vec<Subscriber>,
    pending_failures: VecDeque<TransportError>,
    last_timestamp: u64,
    calls: u64,
}

impl StoreState {
    /// Next server timestamp. Strictly increasing even if the wall clock
    /// stalls or steps backwards.
    fn next_timestamp(&mut self) -> u64 {
        let wall = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        self.last_timestamp = wall.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn resolve(&mut self, write: DocumentWrite) -> Fields {
        let mut fields = write.fields;
        if !write.server_timestamps.is_empty() {
            let now = self.next_timestamp();
            for name in write.server_timestamps {
                fields.insert(name, Value::from(now));
            }
        }
        fields
    }

    fn ordered_documents(&self, collection: &CollectionPath) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        // Documents without a creation time sort after those with one.
        docs.sort_by(|a, b| {
            let ka = (created_at(&a.fields).is_none(), created_at(&a.fields), &a.id);
            let kb = (created_at(&b.fields).is_none(), created_at(&b.fields), &b.id);
            ka.cmp(&kb)
        });
        docs
    }

    fn notify(&mut self, collection: &CollectionPath, change: DocumentChange) {
        let msg = SyncMessage::Changes {
            collection: collection.clone(),
            changes: vec![change],
        };
        self.subscribers.retain(|sub| {
            if sub.collection != *collection || !sub.connected {
                return !sub.tx.is_closed();
            }
            sub.tx.send(Ok(msg.clone())).is_ok()
        });
    }

    fn take_failure(&mut self) -> Result<(), TransportError> {
        self.calls += 1;
        self.pending_failures.pop_front().map_or(Ok(()), Err)
    }
}

fn created_at(fields: &Fields) -> Option<u64> {
    fields.get(CREATED_AT).and_then(Value::as_u64)
}

/// In-memory document store with live subscriptions.
///
/// Thread-safe via [`parking_lot::Mutex`]; no lock is held across an await
/// point.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls (add, set, delete) received, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.state.lock().calls
    }

    /// Number of live subscriptions on `collection`.
    #[must_use]
    pub fn subscriber_count(&self, collection: &CollectionPath) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.collection == *collection && !s.tx.is_closed())
            .count()
    }

    /// Current documents of `collection`, ordered by creation time.
    #[must_use]
    pub fn documents(&self, collection: &CollectionPath) -> Vec<Document> {
        self.state.lock().ordered_documents(collection)
    }

    /// Makes the next write call fail with `error`. Failures queue up.
    pub fn fail_next_write(&self, error: TransportError) {
        self.state.lock().pending_failures.push_back(error);
    }

    /// Stores a document exactly as given, bypassing write validation, and
    /// notifies subscribers. Used to seed data written by other clients.
    pub fn seed(&self, collection: &CollectionPath, doc: Document) {
        let mut state = self.state.lock();
        let existed = state
            .collections
            .entry(collection.clone())
            .or_default()
            .insert(doc.id.clone(), doc.fields.clone())
            .is_some();
        let change = if existed {
            DocumentChange::Modified(doc)
        } else {
            DocumentChange::Added(doc)
        };
        state.notify(collection, change);
    }

    /// Drops every subscription on `collection` with
    /// [`TransportError::ConnectionClosed`]. Subscribers receive nothing
    /// further until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, collection: &CollectionPath) {
        let mut state = self.state.lock();
        for sub in state
            .subscribers
            .iter_mut()
            .filter(|s| s.collection == *collection && s.connected)
        {
            let _ = sub.tx.send(Err(TransportError::ConnectionClosed));
            sub.connected = false;
        }
        tracing::debug!(%collection, "simulated subscription drop");
    }

    /// Restores dropped subscriptions on `collection`, replaying the full
    /// collection to each.
    pub fn reconnect(&self, collection: &CollectionPath) {
        let mut state = self.state.lock();
        let documents = state.ordered_documents(collection);
        for sub in state
            .subscribers
            .iter_mut()
            .filter(|s| s.collection == *collection && !s.connected)
        {
            let _ = sub.tx.send(Ok(SyncMessage::FullState {
                collection: collection.clone(),
                documents: documents.clone(),
            }));
            sub.connected = true;
        }
        tracing::debug!(%collection, "simulated subscription resume");
    }
}

impl DocumentStore for MemoryStore {
    async fn subscribe(&self, collection: &CollectionPath) -> Result<Subscription, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let documents = state.ordered_documents(collection);
        tx.send(Ok(SyncMessage::FullState {
            collection: collection.clone(),
            documents,
        }))
        .map_err(|_| TransportError::ConnectionClosed)?;
        state.subscribers.push(Subscriber {
            collection: collection.clone(),
            tx,
            connected: true,
        });
        drop(state);
        tracing::debug!(%collection, "subscription opened");
        Ok(Subscription::new(collection.clone(), rx))
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        write: DocumentWrite,
    ) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        state.take_failure()?;
        let id = Uuid::now_v7().simple().to_string();
        let fields = state.resolve(write);
        state
            .collections
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), fields.clone());
        state.notify(
            collection,
            DocumentChange::Added(Document {
                id: id.clone(),
                fields,
            }),
        );
        Ok(id)
    }

    async fn set(
        &self,
        doc: &DocPath,
        write: DocumentWrite,
        merge: bool,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.take_failure()?;
        let resolved = state.resolve(write);
        let docs = state.collections.entry(doc.collection.clone()).or_default();
        let existed = docs.contains_key(&doc.id);
        if merge && !existed {
            return Err(TransportError::NotFound(doc.to_string()));
        }
        let fields = if merge {
            let existing = docs.entry(doc.id.clone()).or_default();
            existing.extend(resolved);
            existing.clone()
        } else {
            docs.insert(doc.id.clone(), resolved.clone());
            resolved
        };
        let snapshot = Document {
            id: doc.id.clone(),
            fields,
        };
        let change = if existed {
            DocumentChange::Modified(snapshot)
        } else {
            DocumentChange::Added(snapshot)
        };
        state.notify(&doc.collection, change);
        Ok(())
    }

    async fn delete(&self, doc: &DocPath) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.take_failure()?;
        let removed = state
            .collections
            .get_mut(&doc.collection)
            .and_then(|docs| docs.remove(&doc.id))
            .is_some();
        if removed {
            state.notify(
                &doc.collection,
                DocumentChange::Removed { id: doc.id.clone() },
            );
        }
        Ok(())
    }
}
