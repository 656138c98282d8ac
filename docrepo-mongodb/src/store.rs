use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR},
    options::{ClientOptions, FindOptions},
};
use tracing::debug;

use docrepo_core::{
    backend::{StoreConnection, StoreConnectionBuilder},
    entity::PartitionKey,
    error::{RepositoryError, RepositoryResult},
    page::Page,
    query::{Statement, StatementVisitor},
};

use crate::query::MongoStatementTranslator;

/// Holds the compound `{ pk, id }` key; entity ids are only unique within a partition.
const KEY_FIELD: &str = "_id";

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, container: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(container)
    }

    fn key(id: &str, partition_key: &PartitionKey) -> Document {
        doc! { "pk": partition_key.as_str(), "id": id }
    }

    fn address(id: &str, partition_key: &PartitionKey) -> Document {
        doc! { KEY_FIELD: Self::key(id, partition_key) }
    }

    fn filter(statement: &Statement) -> RepositoryResult<Document> {
        MongoStatementTranslator.visit_statement(statement)
    }

    /// Partition-then-id order, so offset paging sees a stable sequence.
    fn store_order() -> Document {
        doc! { KEY_FIELD: 1 }
    }

    /// One row past the page tells us whether another page exists.
    fn page_limit(max_items: usize) -> i64 {
        i64::try_from(max_items)
            .unwrap_or(i64::MAX - 1)
            .saturating_add(1)
    }

    fn prepare_document(
        id: &str,
        partition_key: &PartitionKey,
        document: &Bson,
    ) -> RepositoryResult<Document> {
        let fields = document
            .as_document()
            .cloned()
            .ok_or_else(|| RepositoryError::Permanent(format!("document '{id}' is not an object")))?;

        Ok(Document::from_iter(
            fields
                .into_iter()
                .chain(Self::address(id, partition_key)),
        ))
    }

    fn restore_document(document: Document) -> Bson {
        Bson::Document(Document::from_iter(
            document
                .into_iter()
                .filter(|(k, _)| k.as_str() != KEY_FIELD),
        ))
    }

    async fn find(
        &self,
        container: &str,
        statement: &Statement,
        options: FindOptions,
    ) -> RepositoryResult<Vec<Bson>> {
        Ok(self
            .get_collection(container)
            .find(Self::filter(statement)?)
            .with_options(options)
            .await
            .map_err(classify)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(classify)?
            .into_iter()
            .map(Self::restore_document)
            .collect())
    }
}

#[async_trait]
impl StoreConnection for MongoDbStore {
    async fn point_read(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> RepositoryResult<Option<Bson>> {
        Ok(self
            .get_collection(container)
            .find_one(Self::address(id, partition_key))
            .await
            .map_err(classify)?
            .map(Self::restore_document))
    }

    async fn upsert(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
        document: Bson,
    ) -> RepositoryResult<Bson> {
        let prepared = Self::prepare_document(id, partition_key, &document)?;

        let result = self
            .get_collection(container)
            .replace_one(Self::address(id, partition_key), prepared)
            .upsert(true)
            .await
            .map_err(classify)?;

        debug!(
            container,
            id,
            partition_key = %partition_key,
            created = result.upserted_id.is_some(),
            "Upserted document"
        );

        Ok(document)
    }

    async fn delete_all(&self, container: &str) -> RepositoryResult<u64> {
        let result = self
            .get_collection(container)
            .delete_many(doc! {})
            .await
            .map_err(classify)?;

        debug!(container, removed = result.deleted_count, "Deleted all documents");

        Ok(result.deleted_count)
    }

    async fn execute_query(
        &self,
        container: &str,
        statement: &Statement,
    ) -> RepositoryResult<Vec<Bson>> {
        let mut options = FindOptions::default();
        options.sort = Some(Self::store_order());

        self.find(container, statement, options).await
    }

    async fn query_page(
        &self,
        container: &str,
        statement: &Statement,
        continuation: Option<String>,
        max_items: usize,
    ) -> RepositoryResult<Page<Bson>> {
        let offset = match continuation.as_deref() {
            Some(token) => token.parse::<u64>().map_err(|_| {
                RepositoryError::Permanent(format!("invalid continuation token {token:?}"))
            })?,
            None => 0,
        };
        let max_items = max_items.max(1);

        let mut options = FindOptions::default();
        options.sort = Some(Self::store_order());
        options.skip = Some(offset);
        options.limit = Some(Self::page_limit(max_items));

        let mut items = self.find(container, statement, options).await?;
        let has_more = items.len() > max_items;
        items.truncate(max_items);

        let next = offset + items.len() as u64;

        Ok(Page::builder(items)
            .with_continuation(has_more.then(|| next.to_string()))
            .build())
    }

    async fn shutdown(&self) -> RepositoryResult<()> {
        self.client.clone().shutdown().await;
        debug!(database = %self.database, "MongoDB client shut down");

        Ok(())
    }
}

/// Splits driver errors into faults worth retrying and everything else.
fn classify(err: MongoError) -> RepositoryError {
    if is_transient(&err.kind, || {
        err.contains_label(RETRYABLE_WRITE_ERROR) || err.contains_label(TRANSIENT_TRANSACTION_ERROR)
    }) {
        RepositoryError::Transient(err.to_string())
    } else {
        RepositoryError::Permanent(err.to_string())
    }
}

fn is_transient(kind: &ErrorKind, labelled: impl FnOnce() -> bool) -> bool {
    match kind {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => true,
        _ => labelled(),
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreConnectionBuilder for MongoDbStoreBuilder {
    type Connection = MongoDbStore;

    async fn build(self) -> RepositoryResult<Self::Connection> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| RepositoryError::Initialization(e.to_string()))?,
            )
            .map_err(|e| RepositoryError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io, sync::Arc};

    #[test]
    fn stored_documents_carry_and_shed_their_address() {
        let pk = PartitionKey::new("L1");
        let prepared = MongoDbStore::prepare_document(
            "a",
            &pk,
            &Bson::Document(doc! { "id": "a", "lastName": "L1" }),
        )
        .unwrap();

        assert_eq!(
            prepared.get_document(KEY_FIELD).unwrap(),
            &doc! { "pk": "L1", "id": "a" }
        );
        assert_eq!(
            MongoDbStore::restore_document(prepared),
            Bson::Document(doc! { "id": "a", "lastName": "L1" })
        );
    }

    #[test]
    fn same_id_in_two_partitions_gets_two_keys() {
        let first = MongoDbStore::address("a", &PartitionKey::new("L1"));
        let second = MongoDbStore::address("a", &PartitionKey::new("L2"));

        assert_ne!(first, second);
        assert_eq!(first, doc! { "_id": { "pk": "L1", "id": "a" } });
    }

    #[test]
    fn page_limit_never_wraps() {
        assert_eq!(MongoDbStore::page_limit(10), 11);
        assert_eq!(MongoDbStore::page_limit(usize::MAX), i64::MAX);
    }

    #[test]
    fn scalar_documents_are_rejected() {
        let err = MongoDbStore::prepare_document("a", &PartitionKey::new("L1"), &Bson::Int32(1))
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Permanent(_)));
    }

    #[test]
    fn io_failures_are_transient() {
        let kind = ErrorKind::Io(Arc::new(io::Error::from(io::ErrorKind::ConnectionReset)));

        assert!(is_transient(&kind, || false));
    }
}
