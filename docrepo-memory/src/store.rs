//! In-memory storage implementation for document stores.
//!
//! This module provides a store connection that keeps documents as BSON values in ordered
//! maps behind async-safe read-write locks.

use async_trait::async_trait;
use bson::Bson;
use mea::rwlock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::debug;

use docrepo_core::{
    backend::{StoreConnection, StoreConnectionBuilder},
    entity::PartitionKey,
    error::{RepositoryError, RepositoryResult},
    page::{Page, paginate_by_offset},
    query::Statement,
};

use crate::evaluator::DocumentEvaluator;

/// Documents of one container keyed by `(partition key, id)`.
///
/// Iteration order of this map is the store order every query reports.
type ContainerMap = BTreeMap<(PartitionKey, String), Bson>;
type StoreMap = HashMap<String, ContainerMap>;

/// Thread-safe in-memory document store connection.
///
/// Documents are addressed by identifier and partition key, so the same identifier may
/// exist once per partition. Queries return documents ordered by partition key and then
/// identifier.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Clones share
/// the same documents and the same open/closed state.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::{backend::StoreConnection, entity::PartitionKey};
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::new();
/// let pk = PartitionKey::new("L1");
///
/// store.upsert("users", "a", &pk, Bson::Document(doc! { "id": "a" })).await?;
/// assert!(store.point_read("users", "a", &pk).await?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// container name -> ((partition key, id) -> document)
    store: Arc<RwLock<StoreMap>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns how many documents `container` holds across all partitions.
    pub async fn len(&self, container: &str) -> usize {
        self.store
            .read()
            .await
            .get(container)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> RepositoryResult<()> {
        if self.is_closed() {
            return Err(RepositoryError::Permanent("connection is closed".to_string()));
        }

        Ok(())
    }

    async fn matching(&self, container: &str, statement: &Statement) -> Vec<Bson> {
        let store = self.store.read().await;

        match store.get(container) {
            Some(documents) => documents
                .values()
                .filter(|doc| DocumentEvaluator::matches(doc, statement))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl StoreConnection for InMemoryStore {
    async fn point_read(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> RepositoryResult<Option<Bson>> {
        self.ensure_open()?;

        let store = self.store.read().await;

        Ok(store
            .get(container)
            .and_then(|documents| documents.get(&(partition_key.clone(), id.to_string())))
            .cloned())
    }

    async fn upsert(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
        document: Bson,
    ) -> RepositoryResult<Bson> {
        self.ensure_open()?;

        if document.as_document().is_none() {
            return Err(RepositoryError::Permanent(format!(
                "document '{id}' is not an object"
            )));
        }

        let mut store = self.store.write().await;
        let replaced = store
            .entry(container.to_string())
            .or_default()
            .insert((partition_key.clone(), id.to_string()), document.clone())
            .is_some();

        debug!(container, id, partition_key = %partition_key, replaced, "Upserted document");

        Ok(document)
    }

    async fn delete_all(&self, container: &str) -> RepositoryResult<u64> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let removed = store
            .get_mut(container)
            .map(|documents| {
                let count = documents.len();
                documents.clear();
                count
            })
            .unwrap_or(0);

        debug!(container, removed, "Deleted all documents");

        Ok(removed as u64)
    }

    async fn execute_query(
        &self,
        container: &str,
        statement: &Statement,
    ) -> RepositoryResult<Vec<Bson>> {
        self.ensure_open()?;

        Ok(self.matching(container, statement).await)
    }

    async fn query_page(
        &self,
        container: &str,
        statement: &Statement,
        continuation: Option<String>,
        max_items: usize,
    ) -> RepositoryResult<Page<Bson>> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let matching = store
            .get(container)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|doc| DocumentEvaluator::matches(doc, statement));

        paginate_by_offset(matching, continuation.as_deref(), max_items)
            .map(|page| page.map(Bson::clone))
            .ok_or_else(|| {
                RepositoryError::Permanent(format!(
                    "invalid continuation token {:?}",
                    continuation.unwrap_or_default()
                ))
            })
    }

    async fn shutdown(&self) -> RepositoryResult<()> {
        self.closed.store(true, Ordering::Release);
        debug!("In-memory store closed");

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::backend::StoreConnectionBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Option<InMemoryStore>,
}

impl InMemoryStoreBuilder {
    /// Builds a handle onto an existing store instead of a fresh one.
    pub fn sharing(mut self, store: &InMemoryStore) -> Self {
        self.seed = Some(store.clone());
        self
    }
}

#[async_trait]
impl StoreConnectionBuilder for InMemoryStoreBuilder {
    type Connection = InMemoryStore;

    async fn build(self) -> RepositoryResult<Self::Connection> {
        Ok(self.seed.unwrap_or_default())
    }
}
