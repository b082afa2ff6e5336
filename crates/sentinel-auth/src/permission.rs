//! Permissions and the scopes they are granted on.

use crate::error::{AuthError, Result};
use sentinel_types::ResourceKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An operation a user may perform on resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Create resources.
    Create,
    /// Read resources and subscribe to their changes.
    Read,
    /// Update resources.
    Update,
    /// Delete resources.
    Delete,
    /// Everything above.
    Admin,
}

impl Permission {
    /// Every permission, in ascending order.
    pub const ALL: [Permission; 5] = [
        Permission::Create,
        Permission::Read,
        Permission::Update,
        Permission::Delete,
        Permission::Admin,
    ];

    /// Check if holding this permission grants `required`.
    pub fn grants(&self, required: Permission) -> bool {
        *self == Permission::Admin || *self == required
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Permission::Create),
            "read" => Some(Permission::Read),
            "update" => Some(Permission::Update),
            "delete" => Some(Permission::Delete),
            "admin" => Some(Permission::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Create => write!(f, "create"),
            Permission::Read => write!(f, "read"),
            Permission::Update => write!(f, "update"),
            Permission::Delete => write!(f, "delete"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

/// Where a grant applies. Missing group or resource act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Project the grant lives in.
    pub project_id: String,
    /// Restrict to one group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Restrict to one resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl Scope {
    /// Scope covering a whole project.
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            group: None,
            resource_id: None,
        }
    }

    fn new(project_id: &str, group: &str, resource_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            group: (!group.is_empty()).then(|| group.to_string()),
            resource_id: (!resource_id.is_empty()).then(|| resource_id.to_string()),
        }
    }

    /// Whether the scope covers the resource.
    pub fn covers(&self, key: &ResourceKey) -> bool {
        if self.project_id != key.project_id {
            return false;
        }
        if let Some(group) = &self.group {
            if key.group.as_ref() != Some(group) {
                return false;
            }
        }
        match &self.resource_id {
            Some(id) => id == &key.resource_id,
            None => true,
        }
    }

    /// Whether the scope is the whole project.
    pub fn is_project_wide(&self) -> bool {
        self.group.is_none() && self.resource_id.is_none()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project:{}", self.project_id)?;
        if let Some(id) = &self.resource_id {
            write!(f, ":resource:{id}")?;
        }
        if let Some(group) = &self.group {
            write!(f, ":group:{group}")?;
        }
        Ok(())
    }
}

/// Request to grant permissions to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPermission {
    /// Grantee. Must not be empty.
    pub user_id: String,
    /// Project. Must not be empty.
    pub project_id: String,
    /// Empty means every resource in the project.
    #[serde(default)]
    pub resource_id: String,
    /// Empty means every group.
    #[serde(default)]
    pub group: String,
    /// At least one permission.
    pub permissions: Vec<Permission>,
}

impl AddPermission {
    pub(crate) fn validate(&self) -> Result<Scope> {
        if self.user_id.is_empty() || self.project_id.is_empty() {
            return Err(AuthError::InvalidInput(
                "user_id and project_id are required".to_string(),
            ));
        }
        if self.permissions.is_empty() {
            return Err(AuthError::InvalidInput(
                "at least one permission is required".to_string(),
            ));
        }
        Ok(Scope::new(&self.project_id, &self.group, &self.resource_id))
    }
}

/// Request to remove a user's grants on a scope.
///
/// Revoking with an empty group and resource id removes every grant the
/// user holds inside the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePermission {
    /// Grantee. Must not be empty.
    pub user_id: String,
    /// Project. Must not be empty.
    pub project_id: String,
    /// Empty means every resource in the project.
    #[serde(default)]
    pub resource_id: String,
    /// Empty means every group.
    #[serde(default)]
    pub group: String,
}

impl RevokePermission {
    pub(crate) fn validate(&self) -> Result<Scope> {
        if self.user_id.is_empty() || self.project_id.is_empty() {
            return Err(AuthError::InvalidInput(
                "user_id and project_id are required".to_string(),
            ));
        }
        Ok(Scope::new(&self.project_id, &self.group, &self.resource_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_grants_everything() {
        for p in Permission::ALL {
            assert!(Permission::Admin.grants(p));
        }
        assert!(Permission::Read.grants(Permission::Read));
        assert!(!Permission::Read.grants(Permission::Update));
    }

    #[test]
    fn test_permission_parse() {
        assert_eq!(Permission::parse("READ"), Some(Permission::Read));
        assert_eq!(Permission::parse("admin"), Some(Permission::Admin));
        assert_eq!(Permission::parse("push"), None);
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::project("p1").to_string(), "project:p1");
        assert_eq!(
            Scope::new("p1", "g", "r").to_string(),
            "project:p1:resource:r:group:g"
        );
    }

    #[test]
    fn test_scope_covers() {
        let key = ResourceKey::new("p1", Some("g".into()), "r1");
        assert!(Scope::project("p1").covers(&key));
        assert!(Scope::new("p1", "g", "").covers(&key));
        assert!(Scope::new("p1", "", "r1").covers(&key));
        assert!(!Scope::new("p1", "other", "").covers(&key));
        assert!(!Scope::project("p2").covers(&key));
    }

    #[test]
    fn test_add_permission_validation() {
        let mut add = AddPermission {
            user_id: "u".into(),
            project_id: "p".into(),
            resource_id: String::new(),
            group: String::new(),
            permissions: vec![],
        };
        assert!(add.validate().is_err());

        add.permissions.push(Permission::Read);
        assert!(add.validate().unwrap().is_project_wide());
    }
}
