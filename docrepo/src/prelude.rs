//! Convenient re-exports of commonly used types from docrepo.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docrepo::prelude::*;
//! ```
//!
//! This provides access to:
//! - Entity traits and partition keys
//! - Store connections, builders and the document store
//! - Query descriptors and method contracts
//! - Both repository facades and the retry policy
//! - Error types and the stream extension traits used to drain query results

pub use docrepo_core::{
    backend::{StoreConnection, StoreConnectionBuilder},
    blocking::BlockingRepository,
    config::{RetryConfig, StoreConfig},
    entity::{Entity, EntityExt, PartitionKey, PartitionKeyResolver},
    error::{RepositoryError, RepositoryResult},
    page::Page,
    query::{Query, QueryDescriptor, QueryMethod, Statement},
    repository::{EntityStream, Repository},
    retry::{ResilientConnection, RetryPolicy},
    store::DocumentStore,
};

pub use futures::{StreamExt, TryStreamExt};
