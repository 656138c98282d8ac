//! Error types and result types for repository operations.
//!
//! Every fallible operation in the workspace returns [`RepositoryResult<T>`]. The variants
//! of [`RepositoryError`] split into two groups: faults the retry layer may absorb
//! ([`RepositoryError::Transient`]) and everything else, which propagates to the caller
//! unchanged.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a repository.
///
/// A missing entity is not an error: point reads return `Ok(None)`.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The query references an unknown field or is otherwise malformed.
    /// Raised locally before any request reaches the store.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// A fault expected to clear on retry (throttling, timeout, dropped connection).
    #[error("Transient store fault: {0}")]
    Transient(String),
    /// A fault that retrying cannot fix (auth failure, rejected statement, oversized payload).
    #[error("Permanent store fault: {0}")]
    Permanent(String),
    /// The retry policy ran out of attempts. Carries the last transient fault.
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The last transient fault observed.
        #[source]
        source: Box<RepositoryError>,
    },
    /// A single-result query matched more than one entity.
    #[error("Expected at most one result, query matched at least {count}")]
    MultipleResults {
        /// How many matches were observed before giving up.
        count: usize,
    },
    /// Serialization/deserialization error when converting between entities and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during connection setup or configuration loading.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl RepositoryError {
    /// Returns `true` if the retry layer should attempt the call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Transient(_))
    }
}

/// A specialized `Result` type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<BsonError> for RepositoryError {
    fn from(err: BsonError) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for RepositoryError {
    fn from(err: config::ConfigError) -> Self {
        RepositoryError::Initialization(err.to_string())
    }
}
