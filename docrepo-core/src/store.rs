//! The document store handle shared by all repositories.
//!
//! A [`DocumentStore`] owns the process-wide connection, wrapped in a
//! [`ResilientConnection`] so every call made through the repositories it hands out is
//! retried under one [`RetryPolicy`].
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new(), RetryPolicy::default());
//! let users = store.repository::<User>(|u: &User| PartitionKey::new(u.last_name.clone()));
//!
//! users.save(&user).await?;
//! store.shutdown().await?;
//! ```

use std::sync::Arc;
use tracing::info;

use crate::{
    backend::{StoreConnection, StoreConnectionBuilder},
    blocking::BlockingRepository,
    config::StoreConfig,
    entity::{Entity, PartitionKeyResolver},
    error::RepositoryResult,
    repository::{DEFAULT_PAGE_SIZE, Repository},
    retry::{ResilientConnection, RetryPolicy},
};

/// Owns the shared store connection and creates repositories bound to it.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    connection: Arc<dyn StoreConnection>,
    page_size: usize,
}

impl DocumentStore {
    /// Wraps `connection` with `policy` and takes ownership of it.
    pub fn new<C: StoreConnection + 'static>(connection: C, policy: RetryPolicy) -> Self {
        Self {
            connection: Arc::new(ResilientConnection::new(connection, policy)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Validates `config`, builds a connection with `builder`, and applies the configured
    /// retry policy and page size.
    pub async fn connect<B>(builder: B, config: &StoreConfig) -> RepositoryResult<Self>
    where
        B: StoreConnectionBuilder,
        B::Connection: 'static,
    {
        config.validate()?;

        let connection = builder.build().await?;
        info!(
            database = %config.database,
            page_size = config.page_size,
            max_attempts = config.retry.max_attempts,
            "Connected to document store"
        );

        Ok(Self::new(connection, RetryPolicy::from(&config.retry)).with_page_size(config.page_size))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The retrying connection shared by every repository from this store.
    pub fn connection(&self) -> Arc<dyn StoreConnection> {
        Arc::clone(&self.connection)
    }

    /// Creates a non-blocking repository for `E`.
    pub fn repository<E: Entity>(
        &self,
        resolver: impl PartitionKeyResolver<E> + 'static,
    ) -> Repository<E> {
        Repository::new(self.connection(), resolver).with_page_size(self.page_size)
    }

    /// Creates a blocking repository for `E`.
    pub fn blocking_repository<E: Entity>(
        &self,
        resolver: impl PartitionKeyResolver<E> + 'static,
    ) -> RepositoryResult<BlockingRepository<E>> {
        BlockingRepository::new(self.repository(resolver))
    }

    /// Releases the connection.
    ///
    /// Repositories created from this store keep their handle to the connection but every
    /// call made after shutdown fails.
    pub async fn shutdown(self) -> RepositoryResult<()> {
        self.connection.shutdown().await?;
        info!("Document store shut down");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity::tests::{User, by_last_name},
        retry::tests::Flaky,
    };
    use std::time::Duration;

    #[tokio::test]
    async fn repositories_share_the_retrying_connection() {
        let store = DocumentStore::new(
            Flaky::new(2),
            RetryPolicy::new(3).with_base_delay(Duration::ZERO),
        )
        .with_page_size(7);

        let users = store.repository::<User>(by_last_name);

        assert_eq!(users.page_size(), 7);
        assert_eq!(users.delete_all().await.unwrap(), 0);
        store.shutdown().await.unwrap();
    }
}
