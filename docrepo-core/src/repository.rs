//! The asynchronous repository facade.
//!
//! A [`Repository`] binds an entity type to a shared [`StoreConnection`] and a
//! [`PartitionKeyResolver`]. Writes and point reads are routed by partition key; queries
//! are translated into statements and either drained into a `Vec` or returned as a
//! pull-driven [`EntityStream`].
//!
//! # Example
//!
//! ```ignore
//! use docrepo::prelude::*;
//!
//! const FIND_BY_FIRST_NAME: QueryMethod = QueryMethod::equals("firstName");
//!
//! let users = Repository::<User>::new(connection, |u: &User| PartitionKey::new(&u.last_name));
//!
//! users.save(&user).await?;
//! let found = users.find_by_id("a", &PartitionKey::new("L1")).await?;
//!
//! let mut stream = users.find_by(FIND_BY_FIRST_NAME.bind_one("F"))?;
//! while let Some(user) = stream.try_next().await? {
//!     println!("{:?}", user);
//! }
//! ```

use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::StoreConnection,
    entity::{Entity, EntityExt, PartitionKey, PartitionKeyResolver},
    error::{RepositoryError, RepositoryResult},
    query::{Query, Statement, StatementTranslator},
};

/// A lazily pulled, finite, non-restartable stream of entities.
pub type EntityStream<'a, E> = BoxStream<'a, RepositoryResult<E>>;

/// Default number of entities fetched per page by streaming queries.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Non-blocking repository for one entity type.
///
/// Cloning a repository is cheap; clones share the connection and resolver.
///
/// The repository does not retry on its own. Wrap the connection in a
/// [`ResilientConnection`](crate::retry::ResilientConnection), or obtain repositories from
/// a [`DocumentStore`](crate::store::DocumentStore), which does so.
pub struct Repository<E: Entity> {
    connection: Arc<dyn StoreConnection>,
    resolver: Arc<dyn PartitionKeyResolver<E>>,
    page_size: usize,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            resolver: Arc::clone(&self.resolver),
            page_size: self.page_size,
        }
    }
}

impl<E: Entity> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("container", &E::container_name())
            .field("connection", &self.connection)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(
        connection: Arc<dyn StoreConnection>,
        resolver: impl PartitionKeyResolver<E> + 'static,
    ) -> Self {
        Self {
            connection,
            resolver: Arc::new(resolver),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many entities streaming queries fetch per page (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn container(&self) -> &'static str {
        E::container_name()
    }

    /// Returns the partition key `entity` is stored under.
    pub fn partition_key(&self, entity: &E) -> PartitionKey {
        self.resolver.resolve(entity)
    }

    /// Creates or replaces `entity` and returns it as stored.
    pub async fn save(&self, entity: &E) -> RepositoryResult<E> {
        let partition_key = self.resolver.resolve(entity);
        debug!(
            container = self.container(),
            id = entity.id(),
            partition_key = %partition_key,
            "Saving entity"
        );

        let stored = self
            .connection
            .upsert(self.container(), entity.id(), &partition_key, entity.to_bson()?)
            .await?;

        E::from_bson(stored)
    }

    /// Removes every entity in the container and returns how many were removed.
    pub async fn delete_all(&self) -> RepositoryResult<u64> {
        let removed = self.connection.delete_all(self.container()).await?;
        debug!(container = self.container(), removed, "Deleted all entities");

        Ok(removed)
    }

    /// Reads one entity directly by identifier and partition key.
    ///
    /// Returns `Ok(None)` if nothing is stored under that pair, including when the
    /// partition key does not match the one the entity was saved with.
    pub async fn find_by_id(
        &self,
        id: &str,
        partition_key: &PartitionKey,
    ) -> RepositoryResult<Option<E>> {
        debug!(
            container = self.container(),
            id,
            partition_key = %partition_key,
            "Point read"
        );

        self.connection
            .point_read(self.container(), id, partition_key)
            .await?
            .map(E::from_bson)
            .transpose()
    }

    /// Streams the entities matching `query` in store order.
    ///
    /// The query is validated immediately; no request is issued until the stream is
    /// polled.
    pub fn find_by(&self, query: impl Into<Query>) -> RepositoryResult<EntityStream<'_, E>> {
        let statement = self.statement(&query.into())?;

        Ok(self.stream(statement, self.page_size))
    }

    /// Streams every entity in the container.
    pub fn find_all(&self) -> EntityStream<'_, E> {
        self.stream(Statement::select_all(), self.page_size)
    }

    /// Runs `query` and returns all matching entities in store order.
    pub async fn collect_by(&self, query: impl Into<Query>) -> RepositoryResult<Vec<E>> {
        let statement = self.statement(&query.into())?;

        self.execute(&statement).await
    }

    /// Returns every entity in the container.
    pub async fn collect_all(&self) -> RepositoryResult<Vec<E>> {
        self.execute(&Statement::select_all()).await
    }

    /// Runs a query expected to match at most one entity.
    ///
    /// Returns `Ok(None)` on no match and [`RepositoryError::MultipleResults`] if more than
    /// one entity matches. At most two entities are fetched.
    pub async fn find_one(&self, query: impl Into<Query>) -> RepositoryResult<Option<E>> {
        let statement = self.statement(&query.into())?;

        let mut matches = self
            .stream(statement, 2)
            .take(2)
            .try_collect::<Vec<_>>()
            .await?;

        match matches.len() {
            0 | 1 => Ok(matches.pop()),
            count => Err(RepositoryError::MultipleResults { count }),
        }
    }

    /// Translates `query` into the statement that would be sent to the store.
    pub fn statement(&self, query: &Query) -> RepositoryResult<Statement> {
        let statement = StatementTranslator::for_entity::<E>().translate(query)?;
        debug!(container = self.container(), statement = %statement, "Translated query");

        Ok(statement)
    }

    async fn execute(&self, statement: &Statement) -> RepositoryResult<Vec<E>> {
        self.connection
            .execute_query(self.container(), statement)
            .await?
            .into_iter()
            .map(E::from_bson)
            .collect()
    }

    fn stream(&self, statement: Statement, page_size: usize) -> EntityStream<'_, E> {
        self.connection
            .execute_query_streaming(self.container(), statement, page_size)
            .map(|document| document.and_then(E::from_bson))
            .boxed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        entity::tests::{User, by_last_name},
        page::{Page, paginate_by_offset},
        query::{Predicate, QueryDescriptor, QueryMethod},
    };
    use crate::retry::{ResilientConnection, RetryPolicy};
    use async_trait::async_trait;
    use bson::Bson;
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    /// Serves a fixed result set for every query and counts the requests it sees.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedStore {
        rows: Vec<Bson>,
        page_fetches: AtomicUsize,
        full_queries: AtomicUsize,
        upserts: AtomicUsize,
        /// 1-based page fetch that fails transiently once; 0 never fails.
        failing_fetch: AtomicUsize,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedStore {
        pub(crate) fn with_users(count: usize) -> Self {
            let rows = (0..count)
                .map(|i| User::new(&format!("u{}", i), "F", "L").to_bson().unwrap())
                .collect();

            Self { rows, ..Self::default() }
        }

        pub(crate) fn page_fetches(&self) -> usize {
            self.page_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StoreConnection for ScriptedStore {
        async fn point_read(
            &self,
            _container: &str,
            id: &str,
            _partition_key: &PartitionKey,
        ) -> RepositoryResult<Option<Bson>> {
            Ok(self
                .rows
                .iter()
                .find(|row| row.as_document().and_then(|d| d.get_str("id").ok()) == Some(id))
                .cloned())
        }

        async fn upsert(
            &self,
            _container: &str,
            _id: &str,
            _partition_key: &PartitionKey,
            document: Bson,
        ) -> RepositoryResult<Bson> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            Ok(document)
        }

        async fn delete_all(&self, _container: &str) -> RepositoryResult<u64> {
            Ok(self.rows.len() as u64)
        }

        async fn execute_query(
            &self,
            _container: &str,
            statement: &Statement,
        ) -> RepositoryResult<Vec<Bson>> {
            self.full_queries.fetch_add(1, Ordering::SeqCst);
            match statement.predicate() {
                Predicate::Nothing => Ok(Vec::new()),
                _ => Ok(self.rows.clone()),
            }
        }

        async fn query_page(
            &self,
            _container: &str,
            statement: &Statement,
            continuation: Option<String>,
            max_items: usize,
        ) -> RepositoryResult<Page<Bson>> {
            let fetch = self.page_fetches.fetch_add(1, Ordering::SeqCst) + 1;
            self.requested.lock().unwrap().push(continuation.clone());
            if fetch == self.failing_fetch.load(Ordering::SeqCst) {
                return Err(RepositoryError::Transient("page fetch timed out".into()));
            }

            let rows = match statement.predicate() {
                Predicate::Nothing => Vec::new(),
                _ => self.rows.clone(),
            };
            paginate_by_offset(rows, continuation.as_deref(), max_items)
                .ok_or_else(|| RepositoryError::Permanent("bad continuation".into()))
        }
    }

    fn repository(store: Arc<ScriptedStore>) -> Repository<User> {
        Repository::new(store, by_last_name)
    }

    #[tokio::test]
    async fn taking_one_element_fetches_one_page() {
        let store = Arc::new(ScriptedStore::with_users(1000));
        let users = repository(store.clone()).with_page_size(10);

        let first = users
            .find_all()
            .take(1)
            .try_collect::<Vec<_>>()
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "u0");
        assert_eq!(store.page_fetches(), 1);
        assert_eq!(store.full_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn streams_request_nothing_until_polled() {
        let store = Arc::new(ScriptedStore::with_users(5));
        let users = repository(store.clone());

        let stream = users.find_all();
        assert_eq!(store.page_fetches(), 0);
        drop(stream);

        assert_eq!(store.page_fetches(), 0);
    }

    #[tokio::test]
    async fn draining_a_stream_walks_every_page_in_order() {
        let store = Arc::new(ScriptedStore::with_users(25));
        let users = repository(store.clone()).with_page_size(10);

        let all = users.find_all().try_collect::<Vec<_>>().await.unwrap();

        let ids = all.iter().map(|u| u.id.clone()).collect::<Vec<_>>();
        let expected = (0..25).map(|i| format!("u{}", i)).collect::<Vec<_>>();
        assert_eq!(ids, expected);
        assert_eq!(store.page_fetches(), 3);
    }

    #[tokio::test]
    async fn a_page_fault_mid_stream_retries_only_that_page() {
        let store = Arc::new(ScriptedStore::with_users(5));
        store.failing_fetch.store(2, Ordering::SeqCst);

        let connection = ResilientConnection::new(
            store.clone(),
            RetryPolicy::new(3).with_base_delay(Duration::ZERO),
        );
        let users = Repository::<User>::new(Arc::new(connection), by_last_name).with_page_size(2);

        let all = users.find_all().try_collect::<Vec<_>>().await.unwrap();

        let ids = all.iter().map(|u| u.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["u0", "u1", "u2", "u3", "u4"]);
        assert_eq!(
            *store.requested.lock().unwrap(),
            vec![None, Some("2".to_string()), Some("2".to_string()), Some("4".to_string())]
        );
    }

    #[tokio::test]
    async fn invalid_query_fails_before_any_request() {
        let store = Arc::new(ScriptedStore::with_users(3));
        let users = repository(store.clone());

        let err = users
            .collect_by(QueryDescriptor::equals("nickname", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidQuery(_)));

        assert!(users.find_by(QueryDescriptor::equals("nickname", "x")).is_err());
        assert_eq!(store.page_fetches(), 0);
        assert_eq!(store.full_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_membership_returns_nothing() {
        let store = Arc::new(ScriptedStore::with_users(3));
        let users = repository(store);

        let method = QueryMethod::is_in("lastName");
        let found = users
            .collect_by(method.bind(Vec::<String>::new()))
            .await
            .unwrap();
        assert!(found.is_empty());

        let streamed = users
            .find_by(method.bind(Vec::<String>::new()))
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert!(streamed.is_empty());
    }

    #[tokio::test]
    async fn find_one_rejects_multiple_matches() {
        let store = Arc::new(ScriptedStore::with_users(3));
        let users = repository(store);

        let err = users
            .find_one(QueryDescriptor::equals("firstName", "F"))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::MultipleResults { count: 2 }));
    }

    #[tokio::test]
    async fn find_one_returns_none_without_matches() {
        let store = Arc::new(ScriptedStore::default());
        let users = repository(store);

        let found = users
            .find_one(QueryDescriptor::equals("firstName", "F"))
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn save_routes_through_upsert() {
        let store = Arc::new(ScriptedStore::default());
        let users = repository(store.clone());
        let user = User::new("a", "F", "L1");

        let saved = users.save(&user).await.unwrap();

        assert_eq!(saved, user);
        assert_eq!(users.partition_key(&user), PartitionKey::new("L1"));
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
    }
}
