//! State-file document model.
//!
//! Two shapes are produced and consumed:
//!
//! - parameter files: `parameters.input.value` holds the entity;
//! - raw templates: `resources[0]` holds the entity.

use serde_json::{json, Map, Value};
use std::path::Path;

use crate::error::StateError;

pub const PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentParameters.json#";
pub const TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#";
pub const CONTENT_VERSION: &str = "1.0.0.0";

/// A parsed state file.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDocument {
    value: Value,
}

impl StateDocument {
    /// Wraps an entity as a parameter file.
    pub fn parameters(entity: Value) -> Self {
        Self {
            value: json!({
                "$schema": PARAMETERS_SCHEMA,
                "contentVersion": CONTENT_VERSION,
                "parameters": {
                    "input": {
                        "value": entity
                    }
                }
            }),
        }
    }

    /// Wraps an entity as a raw deployment template.
    pub fn raw_template(entity: Value) -> Self {
        Self {
            value: json!({
                "$schema": TEMPLATE_SCHEMA,
                "contentVersion": CONTENT_VERSION,
                "resources": [entity]
            }),
        }
    }

    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    pub fn from_slice(path: &Path, bytes: &[u8]) -> Result<Self, StateError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| StateError::InvalidDocument {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(StateError::InvalidDocument {
                path: path.to_path_buf(),
                message: "document root is not an object".to_string(),
            });
        }
        Ok(Self { value })
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// True if this is a raw template rather than a parameter file.
    pub fn is_raw_template(&self) -> bool {
        self.value.get("resources").is_some_and(Value::is_array)
            && self.value.get("parameters").is_none()
    }

    /// The `parameters` object of a parameter file.
    pub fn parameters_object(&self) -> Option<&Value> {
        self.value.get("parameters")
    }

    /// The embedded entity.
    pub fn entity(&self) -> Option<&Value> {
        if self.is_raw_template() {
            self.value.pointer("/resources/0")
        } else {
            self.value.pointer("/parameters/input/value")
        }
    }

    fn entity_mut(&mut self) -> Option<&mut Value> {
        if self.is_raw_template() {
            self.value.pointer_mut("/resources/0")
        } else {
            self.value.pointer_mut("/parameters/input/value")
        }
    }

    /// The scope identifier the document describes (`Id`, else `ResourceId`).
    pub fn identifier(&self) -> Option<&str> {
        let entity = self.entity()?;
        ["Id", "ResourceId"]
            .iter()
            .filter_map(|key| entity.get(*key).and_then(Value::as_str))
            .find(|id| !id.is_empty())
    }

    /// The resource type the entity declares, if any.
    pub fn declared_type(&self) -> Option<&str> {
        let entity = self.entity()?;
        ["Type", "type", "ResourceType"]
            .iter()
            .filter_map(|key| entity.get(*key).and_then(Value::as_str))
            .find(|t| !t.is_empty())
    }

    /// Merges `bag` into the entity's `properties` object, replacing keys
    /// that already exist.
    pub fn merge_properties(&mut self, bag: Map<String, Value>) -> bool {
        let Some(Value::Object(entity)) = self.entity_mut() else {
            return false;
        };

        let properties = entity
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if !properties.is_object() {
            *properties = Value::Object(Map::new());
        }
        if let Value::Object(existing) = properties {
            existing.extend(bag);
        }
        true
    }

    /// Pretty-printed bytes with a trailing newline. Keys are sorted, so
    /// equal documents always serialize to equal bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        let mut bytes = serde_json::to_vec_pretty(&canonicalize(&self.value))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonicalize(&map[key])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Removes every object key named in `excluded` (case-insensitive), at any depth.
pub fn strip_properties(value: &mut Value, excluded: &[String]) {
    if excluded.is_empty() {
        return;
    }
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !excluded.iter().any(|e| e.eq_ignore_ascii_case(key)));
            for child in map.values_mut() {
                strip_properties(child, excluded);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_properties(item, excluded);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_prefers_id() {
        let doc = StateDocument::parameters(json!({
            "Id": "/subscriptions/s",
            "ResourceId": "/other"
        }));
        assert_eq!(doc.identifier(), Some("/subscriptions/s"));

        let doc = StateDocument::parameters(json!({
            "ResourceId": "/subscriptions/s/resourceGroups/rg"
        }));
        assert_eq!(doc.identifier(), Some("/subscriptions/s/resourceGroups/rg"));
    }

    #[test]
    fn test_raw_template_entity() {
        let doc = StateDocument::raw_template(json!({
            "ResourceId": "/subscriptions/s/resourceGroups/rg",
            "type": "Microsoft.Resources/resourceGroups"
        }));
        assert!(doc.is_raw_template());
        assert_eq!(doc.identifier(), Some("/subscriptions/s/resourceGroups/rg"));
        assert_eq!(doc.declared_type(), Some("Microsoft.Resources/resourceGroups"));
    }

    #[test]
    fn test_merge_properties_creates_and_extends() {
        let mut doc = StateDocument::parameters(json!({ "Id": "/x" }));
        let mut bag = Map::new();
        bag.insert("policyAssignments".to_string(), json!([]));
        assert!(doc.merge_properties(bag));

        let mut bag = Map::new();
        bag.insert("roleAssignments".to_string(), json!([{"id": "r"}]));
        assert!(doc.merge_properties(bag));

        let properties = doc.entity().unwrap().get("properties").unwrap();
        assert_eq!(properties["policyAssignments"], json!([]));
        assert_eq!(properties["roleAssignments"][0]["id"], "r");
    }

    #[test]
    fn test_merge_properties_without_entity() {
        let mut doc = StateDocument::from_value(json!({ "unrelated": true }));
        assert!(!doc.merge_properties(Map::new()));
    }

    #[test]
    fn test_strip_properties_recurses() {
        let mut value = json!({
            "etag": "1",
            "properties": {
                "ETag": "2",
                "keep": true,
                "items": [{ "etag": "3", "name": "a" }]
            }
        });
        strip_properties(&mut value, &["etag".to_string()]);
        assert_eq!(
            value,
            json!({ "properties": { "keep": true, "items": [{ "name": "a" }] } })
        );
    }

    #[test]
    fn test_bytes_are_stable() {
        let a = StateDocument::parameters(json!({ "b": 1, "a": 2 }));
        let b = StateDocument::parameters(json!({ "a": 2, "b": 1 }));
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        assert!(a.to_bytes().unwrap().ends_with(b"}\n"));
    }
}
