//! Resource snapshots and their identity.

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of payload carried in [`Resource::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// UTF-8 text.
    Text,
    /// A JSON object.
    JsonObject,
    /// A JSON array.
    JsonArray,
    /// Opaque bytes.
    Binary,
    /// Encoded image bytes.
    Image,
}

impl ResourceType {
    /// All variants, in declaration order.
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Text,
        ResourceType::JsonObject,
        ResourceType::JsonArray,
        ResourceType::Binary,
        ResourceType::Image,
    ];
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Text => write!(f, "text"),
            ResourceType::JsonObject => write!(f, "json_object"),
            ResourceType::JsonArray => write!(f, "json_array"),
            ResourceType::Binary => write!(f, "binary"),
            ResourceType::Image => write!(f, "image"),
        }
    }
}

/// The latest snapshot of a resource owned by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier, unique within `(project_id, group)`.
    pub resource_id: String,
    /// Owning project.
    pub project_id: String,
    /// Optional grouping inside the project.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty::deserialize"
    )]
    pub group: Option<String>,
    /// Kind of payload.
    pub resource_type: ResourceType,
    /// Raw payload. Encoded as standard base64 on the wire.
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Resource {
    /// Create a resource without a group.
    pub fn new(
        project_id: impl Into<String>,
        resource_id: impl Into<String>,
        resource_type: ResourceType,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            project_id: project_id.into(),
            group: None,
            resource_type,
            data: data.into(),
        }
    }

    /// Place the resource in a group. An empty group means no group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        self.group = (!group.is_empty()).then_some(group);
        self
    }

    /// The canonical lookup key of this resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(
            self.project_id.clone(),
            self.group.clone(),
            self.resource_id.clone(),
        )
    }

    /// Encode as a single base64 line of JSON.
    pub fn to_text(&self) -> Result<String, CodecError> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Decode a line produced by [`Resource::to_text`].
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let json = STANDARD.decode(text.trim())?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// Canonical identity of a resource: `(project_id, group, resource_id)`.
///
/// Resource ids are only unique inside their project and group, so every
/// lookup goes through the full triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Owning project.
    pub project_id: String,
    /// Optional group.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty::deserialize"
    )]
    pub group: Option<String>,
    /// Resource id inside the group.
    pub resource_id: String,
}

impl ResourceKey {
    /// Create a key.
    pub fn new(
        project_id: impl Into<String>,
        group: Option<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            group: group.filter(|g| !g.is_empty()),
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}/{}/{}", self.project_id, group, self.resource_id),
            None => write!(f, "{}/{}", self.project_id, self.resource_id),
        }
    }
}

/// Selects a subtree of a project's resources.
///
/// A missing group or resource id acts as a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuery {
    /// Project to search. Required.
    pub project_id: String,
    /// Restrict to one group.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty::deserialize"
    )]
    pub group: Option<String>,
    /// Restrict to one resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ResourceQuery {
    /// Query every resource of a project.
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            group: None,
            resource_id: None,
        }
    }

    /// Restrict the query to a group.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        self.group = (!group.is_empty()).then_some(group);
        self
    }

    /// Restrict the query to a single resource id.
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        let resource_id = resource_id.into();
        self.resource_id = (!resource_id.is_empty()).then_some(resource_id);
        self
    }

    /// Whether `key` falls inside this query.
    pub fn matches(&self, key: &ResourceKey) -> bool {
        if key.project_id != self.project_id {
            return false;
        }
        if let Some(group) = &self.group {
            if key.group.as_ref() != Some(group) {
                return false;
            }
        }
        match &self.resource_id {
            Some(id) => &key.resource_id == id,
            None => true,
        }
    }
}

impl From<&ResourceKey> for ResourceQuery {
    fn from(key: &ResourceKey) -> Self {
        Self {
            project_id: key.project_id.clone(),
            group: key.group.clone(),
            resource_id: Some(key.resource_id.clone()),
        }
    }
}

/// An empty string decodes as `None`, so `"group":""` and a missing group
/// name the same key.
mod non_empty {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.is_empty()))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_json_shape() {
        let resource = Resource::new("proj-1", "r1", ResourceType::Text, b"hi".to_vec());
        let json = serde_json::to_value(&resource).unwrap();

        assert_eq!(json["resource_id"], "r1");
        assert_eq!(json["project_id"], "proj-1");
        assert_eq!(json["resource_type"], "text");
        assert_eq!(json["data"], "aGk=");
        assert!(json.get("group").is_none());
    }

    #[test]
    fn test_empty_data_is_omitted() {
        let resource = Resource::new("p", "r", ResourceType::Binary, Vec::new());
        let json = serde_json::to_string(&resource).unwrap();
        assert!(!json.contains("data"));

        let parsed: Resource = serde_json::from_str(&json).unwrap();
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn test_null_data_decodes_empty() {
        let parsed: Resource = serde_json::from_str(
            r#"{"resource_id":"r","project_id":"p","resource_type":"image","data":null}"#,
        )
        .unwrap();
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn test_empty_group_is_none() {
        let resource = Resource::new("p", "r", ResourceType::Text, b"x".to_vec()).with_group("");
        assert_eq!(resource.group, None);

        let grouped = resource.with_group("g1");
        assert_eq!(grouped.key().to_string(), "p/g1/r");
    }

    #[test]
    fn test_empty_group_decodes_as_none() {
        let parsed: Resource = serde_json::from_str(
            r#"{"resource_id":"r1","project_id":"p","group":"","resource_type":"text"}"#,
        )
        .unwrap();
        assert_eq!(parsed.group, None);
        assert_eq!(parsed.key(), ResourceKey::new("p", None, "r1"));

        let key: ResourceKey =
            serde_json::from_str(r#"{"project_id":"p","group":"","resource_id":"r1"}"#).unwrap();
        assert_eq!(key.group, None);

        let query: ResourceQuery = serde_json::from_str(r#"{"project_id":"p","group":""}"#).unwrap();
        assert_eq!(query.group, None);
    }

    #[test]
    fn test_key_drops_empty_group() {
        let mut resource = Resource::new("p", "r1", ResourceType::Text, b"x".to_vec());
        resource.group = Some(String::new());
        assert_eq!(resource.key(), ResourceKey::new("p", None, "r1"));
    }

    #[test]
    fn test_text_encoding() {
        let resource = Resource::new("p", "r", ResourceType::JsonObject, br#"{"a":1}"#.to_vec())
            .with_group("cfg");
        let text = resource.to_text().unwrap();
        assert!(!text.contains('{'));
        assert_eq!(Resource::from_text(&text).unwrap(), resource);
    }

    #[test]
    fn test_from_text_rejects_garbage() {
        assert!(Resource::from_text("not base64 !!").is_err());
    }

    #[test]
    fn test_query_matches() {
        let key = ResourceKey::new("p", Some("g".into()), "r");

        assert!(ResourceQuery::project("p").matches(&key));
        assert!(ResourceQuery::project("p").in_group("g").matches(&key));
        assert!(ResourceQuery::from(&key).matches(&key));
        assert!(!ResourceQuery::project("p").in_group("other").matches(&key));
        assert!(!ResourceQuery::project("q").matches(&key));
        assert!(!ResourceQuery::project("p").with_resource("x").matches(&key));
    }

    #[test]
    fn test_resource_type_display_matches_serde() {
        for ty in ResourceType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{ty}\""));
        }
    }
}
