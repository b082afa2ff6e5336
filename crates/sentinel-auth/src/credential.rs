//! Credential checks performed when a subscriber connects.

use crate::authorizer::Authorizer;
use crate::error::{AuthError, Result};
use crate::permission::Permission;
use async_trait::async_trait;
use sentinel_types::ResourceKey;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Gate deciding whether an `(apikey, project)` pair may open a stream.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns `Ok(())` if the credentials are accepted.
    async fn verify(&self, apikey: &str, project: &str) -> Result<()>;
}

#[async_trait]
impl<F> CredentialVerifier for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    async fn verify(&self, apikey: &str, project: &str) -> Result<()> {
        (self)(apikey, project)
    }
}

/// Rejects every request. Used when no verifier has been configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

#[async_trait]
impl CredentialVerifier for DenyAll {
    async fn verify(&self, _apikey: &str, project: &str) -> Result<()> {
        warn!(project_id = %project, "Credential verifier not set, rejecting");
        Err(AuthError::Unauthorized(
            "credential verifier not set".to_string(),
        ))
    }
}

/// Fixed table of accepted API keys per project.
#[derive(Debug, Default, Clone)]
pub struct StaticApiKeys {
    keys: HashMap<String, HashSet<String>>,
}

impl StaticApiKeys {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `apikey` for `project`.
    pub fn with_key(mut self, project: impl Into<String>, apikey: impl Into<String>) -> Self {
        self.insert(project, apikey);
        self
    }

    /// Accept `apikey` for `project`.
    pub fn insert(&mut self, project: impl Into<String>, apikey: impl Into<String>) {
        self.keys
            .entry(project.into())
            .or_default()
            .insert(apikey.into());
    }

    /// Number of projects with at least one key.
    pub fn project_count(&self) -> usize {
        self.keys.len()
    }
}

impl FromIterator<(String, String)> for StaticApiKeys {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut keys = Self::new();
        for (project, apikey) in iter {
            keys.insert(project, apikey);
        }
        keys
    }
}

#[async_trait]
impl CredentialVerifier for StaticApiKeys {
    async fn verify(&self, apikey: &str, project: &str) -> Result<()> {
        match self.keys.get(project) {
            Some(keys) if keys.contains(apikey) => Ok(()),
            _ => Err(AuthError::Unauthorized(format!(
                "invalid api key for project {project}"
            ))),
        }
    }
}

/// Accepts an apikey when the [`Authorizer`] grants that user `Read` on the
/// whole project.
#[derive(Debug, Clone)]
pub struct AuthorizerVerifier<A> {
    authorizer: A,
}

impl<A: Authorizer> AuthorizerVerifier<A> {
    /// Wrap an authorizer.
    pub fn new(authorizer: A) -> Self {
        Self { authorizer }
    }
}

#[async_trait]
impl<A: Authorizer> CredentialVerifier for AuthorizerVerifier<A> {
    async fn verify(&self, apikey: &str, project: &str) -> Result<()> {
        // Project-wide grants are the only ones that cover the empty resource id.
        let key = ResourceKey::new(project, None, "");
        let held = self.authorizer.check(apikey, &key).await?;
        if held.iter().any(|p| p.grants(Permission::Read)) {
            Ok(())
        } else {
            Err(AuthError::Unauthorized(format!(
                "no read permission on project {project}"
            )))
        }
    }
}
