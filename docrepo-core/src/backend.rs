//! Store connection abstraction for the repository layer.
//!
//! This module defines the traits that abstract over document store clients, allowing the
//! repositories to work against any backend (in-memory, MongoDB, a remote SQL-dialect
//! service, a test stub).
//!
//! # Overview
//!
//! A [`StoreConnection`] owns one logical session to the store and exposes the handful of
//! primitives the repositories need: point reads and upserts addressed by identifier and
//! partition key, a bulk delete, a fully buffered query and a paged query. Streaming
//! queries are built on top of the paged primitive by [`crate::stream::paged`].
//!
//! # Thread Safety
//!
//! Connections are shared by every repository through an `Arc` and may be called
//! concurrently from retries and live streams. Implementations must be `Send + Sync` and
//! safe under concurrent use.
//!
//! # Faults
//!
//! Implementations report failures as [`RepositoryError::Transient`] when a retry may
//! succeed and [`RepositoryError::Permanent`] otherwise. Retrying is not the connection's
//! job; see [`crate::retry::ResilientConnection`].
//!
//! [`RepositoryError::Transient`]: crate::error::RepositoryError::Transient
//! [`RepositoryError::Permanent`]: crate::error::RepositoryError::Permanent

use async_trait::async_trait;
use bson::Bson;
use futures::stream::BoxStream;
use std::{fmt::Debug, sync::Arc};

use crate::{
    entity::PartitionKey,
    error::RepositoryResult,
    page::Page,
    query::Statement,
    stream,
};

/// A lazily pulled stream of raw documents.
pub type DocumentStream<'a> = BoxStream<'a, RepositoryResult<Bson>>;

/// Abstract interface for a session with a partitioned document store.
#[async_trait]
pub trait StoreConnection: Send + Sync + Debug {
    /// Fetches one document directly by identifier and partition key.
    ///
    /// Returns `Ok(None)` if no document exists under that pair.
    async fn point_read(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> RepositoryResult<Option<Bson>>;

    /// Creates or replaces a document under its identifier and partition key.
    ///
    /// Repeating the call with the same arguments leaves the store unchanged, which is
    /// what makes retrying it safe. Returns the document as stored.
    async fn upsert(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
        document: Bson,
    ) -> RepositoryResult<Bson>;

    /// Removes every document in the container and returns how many were removed.
    ///
    /// Deleting from an empty container is a no-op returning `0`.
    async fn delete_all(&self, container: &str) -> RepositoryResult<u64>;

    /// Runs a statement and returns every matching document in store order.
    async fn execute_query(
        &self,
        container: &str,
        statement: &Statement,
    ) -> RepositoryResult<Vec<Bson>>;

    /// Runs a statement and returns at most `max_items` matching documents, starting
    /// after the position encoded by `continuation`.
    async fn query_page(
        &self,
        container: &str,
        statement: &Statement,
        continuation: Option<String>,
        max_items: usize,
    ) -> RepositoryResult<Page<Bson>>;

    /// Runs a statement as a pull-driven stream.
    ///
    /// No page is requested until the stream is polled, and the next page is only
    /// requested once the previous one has been consumed. Dropping the stream stops
    /// paging.
    fn execute_query_streaming<'a>(
        &'a self,
        container: &'a str,
        statement: Statement,
        page_size: usize,
    ) -> DocumentStream<'a> {
        stream::paged(self, container, statement, page_size)
    }

    /// Releases the connection's network resources.
    ///
    /// The default implementation is a no-op; connections holding sockets or pools
    /// should override it.
    async fn shutdown(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<C> StoreConnection for Arc<C>
where
    C: StoreConnection + ?Sized,
{
    async fn point_read(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> RepositoryResult<Option<Bson>> {
        (**self)
            .point_read(container, id, partition_key)
            .await
    }

    async fn upsert(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
        document: Bson,
    ) -> RepositoryResult<Bson> {
        (**self)
            .upsert(container, id, partition_key, document)
            .await
    }

    async fn delete_all(&self, container: &str) -> RepositoryResult<u64> {
        (**self).delete_all(container).await
    }

    async fn execute_query(
        &self,
        container: &str,
        statement: &Statement,
    ) -> RepositoryResult<Vec<Bson>> {
        (**self)
            .execute_query(container, statement)
            .await
    }

    async fn query_page(
        &self,
        container: &str,
        statement: &Statement,
        continuation: Option<String>,
        max_items: usize,
    ) -> RepositoryResult<Page<Bson>> {
        (**self)
            .query_page(container, statement, continuation, max_items)
            .await
    }

    fn execute_query_streaming<'a>(
        &'a self,
        container: &'a str,
        statement: Statement,
        page_size: usize,
    ) -> DocumentStream<'a> {
        (**self).execute_query_streaming(container, statement, page_size)
    }

    async fn shutdown(&self) -> RepositoryResult<()> {
        (**self).shutdown().await
    }
}

/// Factory trait for creating connections, typically from a [`crate::config::StoreConfig`].
#[async_trait]
pub trait StoreConnectionBuilder {
    type Connection: StoreConnection;

    async fn build(self) -> RepositoryResult<Self::Connection>;
}
