//! Main docrepo crate providing partition-aware repositories over document stores.
//!
//! This crate is the primary entry point for users of docrepo. It re-exports the core
//! types from the sub-crates and provides access to the bundled store connections.
//!
//! # Features
//!
//! - **Partition routing** - Writes and point reads go straight to the entity's partition
//! - **Typed query contracts** - Equality and membership predicates validated before any request
//! - **Two facades** - A blocking repository and a non-blocking, stream-based one
//! - **Retries** - Bounded exponential backoff with jitter around every store call
//! - **Multiple backends** - In-memory and MongoDB connections behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! pub struct User {
//!     pub id: String,
//!     pub first_name: String,
//!     pub last_name: String,
//! }
//!
//! impl Entity for User {
//!     fn id(&self) -> &str { &self.id }
//!     fn container_name() -> &'static str { "users" }
//!     fn fields() -> &'static [&'static str] { &["id", "firstName", "lastName"] }
//! }
//!
//! const FIND_BY_FIRST_NAME: QueryMethod = QueryMethod::equals("firstName");
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> RepositoryResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::new(), RetryPolicy::default());
//!     let users = store.repository::<User>(|u: &User| PartitionKey::new(u.last_name.clone()));
//!
//!     users.save(&user).await?;
//!
//!     let mut stream = users.find_by(FIND_BY_FIRST_NAME.bind_one("F"))?;
//!     while let Some(user) = stream.try_next().await? {
//!         println!("{:?}", user);
//!     }
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Blocking Access
//!
//! The same store hands out blocking repositories. They run each call to completion on
//! the calling thread and must not be used from inside an async context.
//!
//! ```ignore
//! let users = store.blocking_repository::<User>(by_last_name)?;
//!
//! users.delete_all()?;
//! let found: Vec<User> = users.find_by(FIND_BY_FIRST_NAME.bind_one("F"))?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docrepo_core::{
    backend, blocking, config, entity, error, page, query, repository, retry, store, stream,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory store connection.
pub mod memory {
    pub use docrepo_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB store connection.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrepo_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
