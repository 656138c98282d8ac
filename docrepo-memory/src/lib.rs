//! In-memory document store connection for docrepo.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreConnection`
//! trait. It uses async-aware read-write locks for concurrent access and is meant for
//! development, testing and the bundled quickstart.
//!
//! # Features
//!
//! - **Partitioned storage** - Documents are addressed by identifier and partition key
//! - **Type-erased storage** - Stores documents as BSON
//! - **Statement evaluation** - Filters documents by walking the translated predicate
//! - **Offset paging** - Serves streaming queries one page at a time
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> RepositoryResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::new(), RetryPolicy::default());
//!     let users = store.repository::<User>(|u: &User| PartitionKey::new(u.last_name.clone()));
//!
//!     users.save(&User::new("a", "F", "L1")).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
