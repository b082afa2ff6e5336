//! File-backed persister.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<project_id>/<resource_id>.json
//! <root>/<project_id>/<group>/<resource_id>.json
//! ```

use crate::traits::{validate_key, validate_query, Persister};
use crate::{Result, StorageError};
use async_trait::async_trait;
use sentinel_types::{Resource, ResourceKey, ResourceQuery};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const EXTENSION: &str = "json";

/// Stores each resource as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FilePersister {
    root: PathBuf,
}

impl FilePersister {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    fn resource_path(&self, key: &ResourceKey) -> Result<PathBuf> {
        validate_component(&key.project_id)?;
        validate_component(&key.resource_id)?;
        let mut path = self.project_dir(&key.project_id);
        if let Some(group) = &key.group {
            validate_component(group)?;
            path.push(group);
        }
        path.push(format!("{}.{EXTENSION}", key.resource_id));
        Ok(path)
    }

    fn search_dir(&self, query: &ResourceQuery) -> Result<PathBuf> {
        validate_component(&query.project_id)?;
        let mut path = self.project_dir(&query.project_id);
        if let Some(group) = &query.group {
            validate_component(group)?;
            path.push(group);
        }
        Ok(path)
    }

    /// Every `(path, resource)` under the query's directory that matches it.
    async fn scan(&self, query: &ResourceQuery) -> Result<Vec<(PathBuf, Resource)>> {
        let start = self.search_dir(query)?;
        let mut found = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                    continue;
                }
                let resource = load(&path).await?;
                if query.matches(&resource.key()) {
                    found.push((path, resource));
                }
            }
        }

        Ok(found)
    }

    /// Remove the group and project directories left empty by a delete.
    async fn prune(&self, project_id: &str) -> Result<()> {
        let project_dir = self.project_dir(project_id);
        let mut entries = match fs::read_dir(&project_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() && is_dir_empty(&entry.path()).await {
                fs::remove_dir(entry.path()).await?;
            }
        }

        if is_dir_empty(&project_dir).await {
            fs::remove_dir(&project_dir).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Persister for FilePersister {
    async fn save(&self, resource: Resource) -> Result<()> {
        let key = resource.key();
        validate_key(&key)?;
        let path = self.resource_path(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(&resource)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key = %key, path = %path.display(), "Saved resource");
        Ok(())
    }

    async fn get(&self, key: &ResourceKey) -> Result<Resource> {
        validate_key(key)?;
        let path = self.resource_path(key)?;
        match load(&path).await {
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            other => other,
        }
    }

    async fn list(&self, query: &ResourceQuery) -> Result<Vec<Resource>> {
        validate_query(query)?;
        let mut resources: Vec<Resource> = self
            .scan(query)
            .await?
            .into_iter()
            .map(|(_, resource)| resource)
            .collect();
        resources.sort_by_key(Resource::key);
        Ok(resources)
    }

    async fn delete(&self, query: &ResourceQuery) -> Result<()> {
        validate_query(query)?;
        let matched = self.scan(query).await?;

        for (path, _) in &matched {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.prune(&query.project_id).await?;
        debug!(project_id = %query.project_id, removed = matched.len(), "Deleted resources");
        Ok(())
    }

    async fn remove(&self, key: &ResourceKey) -> Result<()> {
        validate_key(key)?;
        let path = self.resource_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        self.prune(&key.project_id).await?;
        debug!(key = %key, "Removed resource");
        Ok(())
    }
}

async fn load(path: &Path) -> Result<Resource> {
    let data = fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

async fn is_dir_empty(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

/// Path components must stay inside their parent directory.
fn validate_component(part: &str) -> Result<()> {
    if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
        return Err(StorageError::InvalidQuery(format!(
            "invalid path component: {part:?}"
        )));
    }
    Ok(())
}
