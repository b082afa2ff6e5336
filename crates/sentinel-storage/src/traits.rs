//! Persister trait.
//!
//! Defines the interface every resource store implements so that the
//! broadcaster and the agent can be wired to any backend.

use crate::Result;
use async_trait::async_trait;
use sentinel_types::{Resource, ResourceKey, ResourceQuery};
use std::sync::Arc;

/// Durable store of the latest snapshot of each resource.
///
/// Resources are identified by their full [`ResourceKey`].
#[async_trait]
pub trait Persister: Send + Sync {
    /// Stores a resource, replacing any previous snapshot with the same key.
    async fn save(&self, resource: Resource) -> Result<()>;

    /// Retrieves a resource by key.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) if absent.
    async fn get(&self, key: &ResourceKey) -> Result<Resource>;

    /// Lists every resource selected by the query.
    async fn list(&self, query: &ResourceQuery) -> Result<Vec<Resource>>;

    /// Deletes every resource selected by the query. Deleting nothing is not an error.
    async fn delete(&self, query: &ResourceQuery) -> Result<()>;

    /// Deletes exactly the resource stored under `key`, if any.
    async fn remove(&self, key: &ResourceKey) -> Result<()>;
}

#[async_trait]
impl<T: Persister + ?Sized> Persister for Arc<T> {
    async fn save(&self, resource: Resource) -> Result<()> {
        (**self).save(resource).await
    }

    async fn get(&self, key: &ResourceKey) -> Result<Resource> {
        (**self).get(key).await
    }

    async fn list(&self, query: &ResourceQuery) -> Result<Vec<Resource>> {
        (**self).list(query).await
    }

    async fn delete(&self, query: &ResourceQuery) -> Result<()> {
        (**self).delete(query).await
    }

    async fn remove(&self, key: &ResourceKey) -> Result<()> {
        (**self).remove(key).await
    }
}

pub(crate) fn validate_query(query: &ResourceQuery) -> Result<()> {
    if query.project_id.is_empty() {
        return Err(crate::StorageError::InvalidQuery(
            "project_id is required".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_key(key: &ResourceKey) -> Result<()> {
    if key.project_id.is_empty() || key.resource_id.is_empty() {
        return Err(crate::StorageError::InvalidQuery(
            "project_id and resource_id are required".to_string(),
        ));
    }
    Ok(())
}
