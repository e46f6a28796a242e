//! Remote document store access and static snapshot I/O.
//!
//! - [`DocumentStore`]: the remote store seam (Firestore in production,
//!   [`MemoryStore`] in tests)
//! - [`export_dataset`]: pull every collection and singleton into a [`Snapshot`]
//! - [`snapshot`]: whole-file snapshot reads and backed-up atomic writes
//!
//! Stores are built once from configuration and passed explicitly to every
//! job; nothing here holds a global connection.

mod codec;
mod firestore;
pub mod snapshot;

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use contentsync_shared::{
    Collection, ContentSyncError, Result, SINGLETON_COLLECTION, Singleton, Snapshot,
};

pub use codec::{
    decode_fields, decode_value, encode_fields, encode_fields_preserving, encode_value,
    encode_value_preserving,
};
pub use firestore::FirestoreStore;
pub use snapshot::{
    SnapshotWrite, backup_file, load_snapshot, write_atomic, write_json_atomic, write_snapshot,
};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A remote document store holding named collections of JSON documents.
///
/// Documents are returned as `{id, ...fields}` objects. Writes are full
/// replacements keyed by id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Value>>;

    /// One document, or `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Replace (or create) the document `id` with `document`.
    async fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()>;

    /// Human-readable store name for tracing.
    fn name(&self) -> &str;
}

/// Attach the document id to a document body.
pub(crate) fn with_id(id: &str, mut document: Value) -> Value {
    if let Value::Object(map) = &mut document {
        map.insert("id".into(), Value::String(id.to_string()));
    }
    document
}

/// Drop the `id` field, which is implied by a document's key.
pub(crate) fn without_id(document: &Value) -> Value {
    let mut document = document.clone();
    if let Value::Object(map) = &mut document {
        map.remove("id");
    }
    document
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`DocumentStore`] for tests, fakes and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
    failing_writes: HashSet<(String, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with the contents of a snapshot, laid out the way
    /// [`export_dataset`] reads them back.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut collections: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();

        for collection in Collection::ALL {
            let docs = collections.entry(collection.as_str().to_string()).or_default();
            match collection {
                Collection::Pages => {
                    for (id, page) in &snapshot.pages {
                        docs.insert(id.clone(), with_id(id, page.clone()));
                    }
                }
                _ => {
                    for record in snapshot.records(collection) {
                        if let Some(id) = record.get("id").and_then(Value::as_str) {
                            docs.insert(id.to_string(), record.clone());
                        }
                    }
                }
            }
        }

        for singleton in Singleton::ALL {
            if let Some(doc) = snapshot.singleton(singleton) {
                collections
                    .entry(SINGLETON_COLLECTION.to_string())
                    .or_default()
                    .insert(singleton.id().to_string(), with_id(singleton.id(), doc.clone()));
            }
        }

        Self {
            collections: RwLock::new(collections),
            failing_writes: HashSet::new(),
        }
    }

    /// Make every write to `collection/id` fail.
    pub fn with_failing_write(mut self, collection: &str, id: &str) -> Self {
        self.failing_writes
            .insert((collection.to_string(), id.to_string()));
        self
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
        if self
            .failing_writes
            .contains(&(collection.to_string(), id.to_string()))
        {
            return Err(ContentSyncError::Store(format!(
                "write rejected for {collection}/{id}"
            )));
        }
        if !document.is_object() {
            return Err(ContentSyncError::validation(format!(
                "document {collection}/{id} is not a JSON object"
            )));
        }

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), with_id(id, document.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Pull every collection and singleton from the remote store into memory.
///
/// Pages and singletons are keyed by their document id, so the `id` field is
/// dropped from their bodies.
#[instrument(skip_all, fields(store = store.name()))]
pub async fn export_dataset(store: &dyn DocumentStore) -> Result<Snapshot> {
    let mut dataset = Snapshot::default();

    for collection in Collection::ALL {
        let docs = store.list(collection.as_str()).await?;
        debug!(collection = %collection, count = docs.len(), "exported collection");

        match dataset.list_mut(collection) {
            Some(list) => *list = docs,
            None => {
                for doc in docs {
                    if let Some(id) = doc.get("id").and_then(Value::as_str) {
                        dataset.pages.insert(id.to_string(), without_id(&doc));
                    }
                }
            }
        }
    }

    for singleton in Singleton::ALL {
        let doc = store.get(SINGLETON_COLLECTION, singleton.id()).await?;
        dataset.set_singleton(singleton, doc.as_ref().map(without_id));
    }

    info!(records = dataset.record_count(), "remote export complete");
    Ok(dataset)
}
