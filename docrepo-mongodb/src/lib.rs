//! MongoDB store connection for docrepo.
//!
//! This crate provides a MongoDB-based implementation of the `StoreConnection` trait.
//! Every document is stored under a compound `_id` of `{ pk, id }`, so the same entity
//! id may exist once per partition. The key is stripped again before documents are
//! handed back to a repository.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docrepo = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Faults
//!
//! I/O failures, server selection timeouts, cleared connection pools and errors the
//! server labels as retryable are reported as transient. Everything else is permanent.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{prelude::*, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> RepositoryResult<()> {
//!     let config = StoreConfig::from_env()?;
//!     let store = DocumentStore::connect(
//!         MongoDbStore::builder(&config.endpoint, &config.database),
//!         &config,
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_mongodb;

mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
