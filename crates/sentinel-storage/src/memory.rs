//! In-memory persister.

use crate::traits::{validate_key, validate_query, Persister};
use crate::{Result, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use sentinel_types::{Resource, ResourceKey, ResourceQuery};
use std::collections::BTreeMap;

/// Thread-safe in-memory resource store.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    resources: RwLock<BTreeMap<ResourceKey, Resource>>,
}

impl MemoryPersister {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn save(&self, resource: Resource) -> Result<()> {
        let key = resource.key();
        validate_key(&key)?;
        self.resources.write().insert(key, resource);
        Ok(())
    }

    async fn get(&self, key: &ResourceKey) -> Result<Resource> {
        self.resources
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, query: &ResourceQuery) -> Result<Vec<Resource>> {
        validate_query(query)?;
        Ok(self
            .resources
            .read()
            .iter()
            .filter(|(key, _)| query.matches(key))
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    async fn delete(&self, query: &ResourceQuery) -> Result<()> {
        validate_query(query)?;
        self.resources.write().retain(|key, _| !query.matches(key));
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> Result<()> {
        validate_key(key)?;
        self.resources.write().remove(key);
        Ok(())
    }
}
