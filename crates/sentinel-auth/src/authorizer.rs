//! Per-user resource permissions.

use crate::error::Result;
use crate::permission::{AddPermission, Permission, RevokePermission, Scope};
use async_trait::async_trait;
use parking_lot::RwLock;
use sentinel_types::ResourceKey;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Issues and checks permissions for `(user, resource)` pairs.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Every permission the user holds on the resource.
    async fn check(&self, user_id: &str, key: &ResourceKey) -> Result<Vec<Permission>>;

    /// Grant permissions.
    async fn add(&self, perm: AddPermission) -> Result<()>;

    /// Remove grants.
    async fn revoke(&self, perm: RevokePermission) -> Result<()>;
}

#[async_trait]
impl<T: Authorizer + ?Sized> Authorizer for Arc<T> {
    async fn check(&self, user_id: &str, key: &ResourceKey) -> Result<Vec<Permission>> {
        (**self).check(user_id, key).await
    }

    async fn add(&self, perm: AddPermission) -> Result<()> {
        (**self).add(perm).await
    }

    async fn revoke(&self, perm: RevokePermission) -> Result<()> {
        (**self).revoke(perm).await
    }
}

type Policies = BTreeMap<Scope, BTreeSet<Permission>>;

/// In-memory policy table.
#[derive(Debug, Default)]
pub struct MemoryAuthorizer {
    policies: RwLock<HashMap<String, Policies>>,
}

impl MemoryAuthorizer {
    /// Create an empty policy table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `(user, scope)` entries.
    pub fn grant_count(&self) -> usize {
        self.policies.read().values().map(|p| p.len()).sum()
    }
}

#[async_trait]
impl Authorizer for MemoryAuthorizer {
    async fn check(&self, user_id: &str, key: &ResourceKey) -> Result<Vec<Permission>> {
        let policies = self.policies.read();
        let Some(user) = policies.get(user_id) else {
            return Ok(Vec::new());
        };

        let held: BTreeSet<Permission> = user
            .iter()
            .filter(|(scope, _)| scope.covers(key))
            .flat_map(|(_, perms)| perms.iter().copied())
            .collect();

        if held.contains(&Permission::Admin) {
            return Ok(Permission::ALL.to_vec());
        }
        Ok(held.into_iter().collect())
    }

    async fn add(&self, perm: AddPermission) -> Result<()> {
        let scope = perm.validate()?;
        debug!(user_id = %perm.user_id, scope = %scope, "Granting permissions");

        self.policies
            .write()
            .entry(perm.user_id)
            .or_default()
            .entry(scope)
            .or_default()
            .extend(perm.permissions);
        Ok(())
    }

    async fn revoke(&self, perm: RevokePermission) -> Result<()> {
        let scope = perm.validate()?;
        debug!(user_id = %perm.user_id, scope = %scope, "Revoking permissions");

        let mut policies = self.policies.write();
        if let Some(user) = policies.get_mut(&perm.user_id) {
            if scope.is_project_wide() {
                user.retain(|s, _| s.project_id != scope.project_id);
            } else {
                user.remove(&scope);
            }
            if user.is_empty() {
                policies.remove(&perm.user_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(user: &str, group: &str, resource: &str, perms: &[Permission]) -> AddPermission {
        AddPermission {
            user_id: user.to_string(),
            project_id: "project1".to_string(),
            resource_id: resource.to_string(),
            group: group.to_string(),
            permissions: perms.to_vec(),
        }
    }

    fn key(group: Option<&str>, resource: &str) -> ResourceKey {
        ResourceKey::new("project1", group.map(str::to_string), resource)
    }

    #[tokio::test]
    async fn test_add_and_check() {
        let auth = MemoryAuthorizer::new();
        auth.add(add("user123", "", "resource1", &[Permission::Read, Permission::Update]))
            .await
            .unwrap();

        let perms = auth.check("user123", &key(None, "resource1")).await.unwrap();
        assert_eq!(perms, vec![Permission::Read, Permission::Update]);

        assert!(auth
            .check("user123", &key(None, "resource2"))
            .await
            .unwrap()
            .is_empty());
        assert!(auth
            .check("nobody", &key(None, "resource1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_project_grant_covers_groups() {
        let auth = MemoryAuthorizer::new();
        auth.add(add("u", "", "", &[Permission::Read])).await.unwrap();

        let perms = auth.check("u", &key(Some("g"), "anything")).await.unwrap();
        assert_eq!(perms, vec![Permission::Read]);
    }

    #[tokio::test]
    async fn test_admin_expands() {
        let auth = MemoryAuthorizer::new();
        auth.add(add("u", "g", "", &[Permission::Admin])).await.unwrap();

        assert_eq!(
            auth.check("u", &key(Some("g"), "r")).await.unwrap(),
            Permission::ALL.to_vec()
        );
        assert!(auth.check("u", &key(None, "r")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_resource_scope() {
        let auth = MemoryAuthorizer::new();
        auth.add(add("u", "", "r1", &[Permission::Read])).await.unwrap();
        auth.add(add("u", "", "r2", &[Permission::Read])).await.unwrap();

        auth.revoke(RevokePermission {
            user_id: "u".into(),
            project_id: "project1".into(),
            resource_id: "r1".into(),
            group: String::new(),
        })
        .await
        .unwrap();

        assert!(auth.check("u", &key(None, "r1")).await.unwrap().is_empty());
        assert_eq!(auth.grant_count(), 1);
    }

    #[tokio::test]
    async fn test_revoke_project_removes_everything_inside() {
        let auth = MemoryAuthorizer::new();
        auth.add(add("u", "", "r1", &[Permission::Read])).await.unwrap();
        auth.add(add("u", "g", "", &[Permission::Update])).await.unwrap();

        auth.revoke(RevokePermission {
            user_id: "u".into(),
            project_id: "project1".into(),
            resource_id: String::new(),
            group: String::new(),
        })
        .await
        .unwrap();

        assert_eq!(auth.grant_count(), 0);
    }

    #[tokio::test]
    async fn test_add_rejects_empty_permissions() {
        let auth = MemoryAuthorizer::new();
        assert!(auth.add(add("u", "", "", &[])).await.is_err());
    }
}
