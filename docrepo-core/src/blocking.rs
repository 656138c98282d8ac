//! The blocking repository facade.
//!
//! [`BlockingRepository`] exposes the same operations as [`Repository`] as plain
//! functions. Each call runs to completion on the calling thread, retries included, and
//! query results are fully materialized before they are returned.
//!
//! The facade owns a private current-thread runtime. Creating, calling or dropping a
//! [`BlockingRepository`] from inside an async context panics; use [`Repository`] there,
//! or move the facade to a plain thread (for example with `spawn_blocking`).

use tokio::runtime::{Builder, Runtime};

use crate::{
    entity::{Entity, PartitionKey},
    error::{RepositoryError, RepositoryResult},
    query::Query,
    repository::Repository,
};

/// Blocking repository for one entity type.
///
/// Must be created and dropped outside any async runtime, since it owns one.
#[derive(Debug)]
pub struct BlockingRepository<E: Entity> {
    inner: Repository<E>,
    runtime: Runtime,
}

impl<E: Entity> BlockingRepository<E> {
    pub fn new(inner: Repository<E>) -> RepositoryResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RepositoryError::Initialization(e.to_string()))?;

        Ok(Self { inner, runtime })
    }

    /// The non-blocking repository this facade drives.
    pub fn as_async(&self) -> &Repository<E> {
        &self.inner
    }

    pub fn into_async(self) -> Repository<E> {
        self.inner
    }

    /// Creates or replaces `entity` and returns it as stored.
    pub fn save(&self, entity: &E) -> RepositoryResult<E> {
        self.runtime.block_on(self.inner.save(entity))
    }

    /// Removes every entity in the container and returns how many were removed.
    pub fn delete_all(&self) -> RepositoryResult<u64> {
        self.runtime.block_on(self.inner.delete_all())
    }

    /// Reads one entity directly by identifier and partition key.
    pub fn find_by_id(&self, id: &str, partition_key: &PartitionKey) -> RepositoryResult<Option<E>> {
        self.runtime
            .block_on(self.inner.find_by_id(id, partition_key))
    }

    /// Returns every entity matching `query`, in store order.
    pub fn find_by(&self, query: impl Into<Query>) -> RepositoryResult<Vec<E>> {
        self.runtime.block_on(self.inner.collect_by(query))
    }

    /// Returns every entity in the container, in store order.
    pub fn find_all(&self) -> RepositoryResult<Vec<E>> {
        self.runtime.block_on(self.inner.collect_all())
    }

    /// Runs a query expected to match at most one entity.
    pub fn find_one(&self, query: impl Into<Query>) -> RepositoryResult<Option<E>> {
        self.runtime.block_on(self.inner.find_one(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity::tests::{User, by_last_name},
        query::QueryDescriptor,
        repository::tests::ScriptedStore,
        retry::{ResilientConnection, RetryPolicy, tests::Flaky},
    };
    use std::{sync::Arc, time::Duration};

    #[test]
    fn queries_are_materialized_on_the_calling_thread() {
        let store = Arc::new(ScriptedStore::with_users(3));
        let users =
            BlockingRepository::new(Repository::<User>::new(store.clone(), by_last_name)).unwrap();

        let all = users.find_all().unwrap();
        let by_name = users
            .find_by(QueryDescriptor::equals("firstName", "F"))
            .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(by_name.len(), 3);
        assert_eq!(store.page_fetches(), 0);
    }

    #[test]
    fn retries_block_until_the_call_succeeds() {
        let connection = ResilientConnection::new(
            Flaky::new(2),
            RetryPolicy::new(3).with_base_delay(Duration::from_millis(1)),
        );
        let users =
            BlockingRepository::new(Repository::<User>::new(Arc::new(connection), by_last_name))
                .unwrap();

        assert_eq!(users.delete_all().unwrap(), 0);
    }

    #[test]
    fn can_be_created_used_and_dropped_on_a_plain_thread() {
        let store = Arc::new(ScriptedStore::with_users(2));

        let found = std::thread::spawn(move || {
            let users =
                BlockingRepository::new(Repository::<User>::new(store, by_last_name)).unwrap();
            let found = users.find_all().unwrap();
            drop(users);
            found
        })
        .join()
        .unwrap();

        assert_eq!(found.len(), 2);
    }

    #[test]
    fn unknown_fields_fail_locally() {
        let store = Arc::new(ScriptedStore::with_users(1));
        let users = BlockingRepository::new(Repository::<User>::new(store, by_last_name)).unwrap();

        let err = users
            .find_by(QueryDescriptor::is_in("age", [1, 2]))
            .unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidQuery(_)));
    }
}
