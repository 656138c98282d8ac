//! A partition-aware repository layer over JSON document stores.
//!
//! This crate is the core of the docrepo project and provides:
//!
//! - **Entity traits** ([`entity`]) - Entities, partition keys and partition key resolvers
//! - **Store connection abstraction** ([`backend`]) - The primitives a store client must provide
//! - **Query translation** ([`query`]) - Typed query descriptors rendered into store statements
//! - **Retries** ([`retry`]) - Bounded exponential backoff around every store call
//! - **Repositories** ([`repository`], [`blocking`]) - Non-blocking and blocking facades
//! - **Streaming** ([`stream`], [`page`]) - Pull-driven paging with one page of buffering
//! - **Document store** ([`store`]) - The shared connection handle that creates repositories
//! - **Configuration** ([`config`]) - Connection and retry settings
//! - **Error handling** ([`error`]) - The error taxonomy and result type
//!
//! # Example
//!
//! ```ignore
//! use docrepo::entity::{Entity, PartitionKey};
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
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn container_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn fields() -> &'static [&'static str] {
//!         &["id", "firstName", "lastName"]
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_core;

pub mod backend;
pub mod blocking;
pub mod config;
pub mod entity;
pub mod error;
pub mod page;
pub mod query;
pub mod repository;
pub mod retry;
pub mod store;
pub mod stream;
