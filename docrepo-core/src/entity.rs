//! Core traits and types for entity representation and partition routing.
//!
//! This module provides the trait every stored record implements, the [`PartitionKey`]
//! value used to route point operations, and the [`PartitionKeyResolver`] that derives
//! one from the other.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RepositoryError, RepositoryResult};

/// Core trait that all entities stored through a repository must implement.
///
/// An entity has a string identifier, lives in a named container, and declares the
/// attribute names queries may reference. The repository never inspects attributes
/// beyond what [`Entity::fields`] lists.
///
/// # Example
///
/// ```ignore
/// use docrepo::entity::Entity;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// pub struct User {
///     pub id: String,
///     pub first_name: String,
///     pub last_name: String,
/// }
///
/// impl Entity for User {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn container_name() -> &'static str {
///         "users"
///     }
///
///     fn fields() -> &'static [&'static str] {
///         &["id", "firstName", "lastName"]
///     }
/// }
/// ```
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns this entity's identifier, unique within its partition.
    fn id(&self) -> &str;

    /// Returns the name of the container this entity is stored in.
    fn container_name() -> &'static str;

    /// Returns the serialized attribute names that queries may filter on.
    fn fields() -> &'static [&'static str];
}

/// Extension trait providing BSON conversion for entities.
///
/// Implemented automatically for every [`Entity`].
pub trait EntityExt: Entity {
    /// Converts this entity to a BSON document for storage.
    fn to_bson(&self) -> RepositoryResult<Bson>;

    /// Creates an entity from a stored BSON document.
    fn from_bson(bson: Bson) -> RepositoryResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_bson(&self) -> RepositoryResult<Bson> {
        match serialize_to_bson(self)? {
            doc @ Bson::Document(_) => Ok(doc),
            other => Err(RepositoryError::Serialization(format!(
                "entity in {} serialized to {:?}, expected a document",
                E::container_name(),
                other.element_type(),
            ))),
        }
    }

    fn from_bson(bson: Bson) -> RepositoryResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}

/// The value a store uses to co-locate and route an entity.
///
/// A partition key is computed once when an entity is written and must be supplied
/// unchanged for every later point read of that entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<PartitionKey> for Bson {
    fn from(key: PartitionKey) -> Self {
        Bson::String(key.0)
    }
}

/// Maps an entity to its partition key.
///
/// Implementations must be pure: the same entity must always resolve to the same key,
/// otherwise point reads report the entity as missing even though it exists under a
/// different key.
///
/// Any `Fn(&E) -> PartitionKey` closure is a resolver:
///
/// ```ignore
/// let resolver = |user: &User| PartitionKey::new(user.last_name.clone());
/// ```
pub trait PartitionKeyResolver<E: Entity>: Send + Sync {
    /// Returns the partition key for `entity`.
    fn resolve(&self, entity: &E) -> PartitionKey;
}

impl<E, F> PartitionKeyResolver<E> for F
where
    E: Entity,
    F: Fn(&E) -> PartitionKey + Send + Sync,
{
    fn resolve(&self, entity: &E) -> PartitionKey {
        self(entity)
    }
}
