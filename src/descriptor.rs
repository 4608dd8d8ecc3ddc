// Copyright 2025 Cowboy AI, LLC.

//! The composite map: attribute key to child descriptor

use crate::child::{ChildKind, ChildType};
use crate::registry::ParseFn;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// How one attribute of the host backs one child slot
#[derive(Debug, Clone)]
pub struct ChildDescriptor {
    /// Attribute key in the host's store
    pub attribute: String,
    /// Declared child type, carrying the variant tag
    pub child_type: ChildType,
    /// Name of the child slot on the host
    pub property: String,
    /// Update capability invoked on an occupied slot
    pub method: String,
    /// Options merged into every construct and update call
    pub options: Map<String, Value>,
    /// Transform applied to incoming values
    pub parse: Option<ParseFn>,
}

impl ChildDescriptor {
    /// Variant tag of the child
    pub fn kind(&self) -> ChildKind {
        self.child_type.kind()
    }

    /// Inspectable summary of the descriptor
    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            kind: self.kind(),
            type_name: self.child_type.type_name().to_string(),
            property: self.property.clone(),
            method: self.method.clone(),
            options: self.options.clone(),
            parse: self.parse.as_ref().map(|parse| parse.name().to_string()),
        }
    }
}

/// Serializable view of a [`ChildDescriptor`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorSummary {
    /// Variant tag
    pub kind: ChildKind,
    /// Child type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Slot name
    pub property: String,
    /// Update method
    pub method: String,
    /// Call options
    pub options: Map<String, Value>,
    /// Parse function name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse: Option<String>,
}

/// Canonical, insertion-ordered attribute key to descriptor mapping
///
/// Built once per host by the normalizer and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct CompositeMap {
    entries: IndexMap<String, ChildDescriptor>,
}

impl CompositeMap {
    pub(crate) fn from_entries(entries: IndexMap<String, ChildDescriptor>) -> Self {
        Self { entries }
    }

    /// Descriptor for an attribute key
    pub fn get(&self, attribute: &str) -> Option<&ChildDescriptor> {
        self.entries.get(attribute)
    }

    /// Descriptor owning a child property
    pub fn by_property(&self, property: &str) -> Option<&ChildDescriptor> {
        self.entries.values().find(|descriptor| descriptor.property == property)
    }

    /// Check if an attribute key backs a child
    pub fn contains(&self, attribute: &str) -> bool {
        self.entries.contains_key(attribute)
    }

    /// Descriptors in map order
    pub fn iter(&self) -> impl Iterator<Item = &ChildDescriptor> {
        self.entries.values()
    }

    /// Attribute keys in map order
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no attribute backs a child
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inspectable summary keyed by attribute
    pub fn describe(&self) -> IndexMap<String, DescriptorSummary> {
        self.entries
            .iter()
            .map(|(attribute, descriptor)| (attribute.clone(), descriptor.summary()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordListType, RecordType};
    use serde_json::json;

    fn descriptor(attribute: &str, property: &str, child_type: ChildType) -> ChildDescriptor {
        ChildDescriptor {
            attribute: attribute.to_string(),
            method: child_type.kind().default_method().to_string(),
            child_type,
            property: property.to_string(),
            options: Map::new(),
            parse: None,
        }
    }

    #[test]
    fn test_map_lookup_and_order() {
        let mut entries = IndexMap::new();
        entries.insert(
            "parent_expanded".to_string(),
            descriptor("parent_expanded", "parent", ChildType::entity(RecordType::new("Folder"))),
        );
        entries.insert(
            "versions".to_string(),
            descriptor(
                "versions",
                "versions",
                ChildType::collection(RecordListType::new("Versions", RecordType::new("Version"))),
            ),
        );
        let map = CompositeMap::from_entries(entries);

        assert_eq!(map.len(), 2);
        assert_eq!(map.attributes().collect::<Vec<_>>(), vec!["parent_expanded", "versions"]);
        assert_eq!(map.by_property("parent").map(|d| d.attribute.as_str()), Some("parent_expanded"));
        assert!(map.get("parent").is_none());
        assert_eq!(map.get("versions").map(ChildDescriptor::kind), Some(ChildKind::Collection));
    }

    #[test]
    fn test_describe_serializes() {
        let mut entries = IndexMap::new();
        entries.insert(
            "parent".to_string(),
            descriptor("parent", "parent", ChildType::entity(RecordType::new("Folder"))),
        );
        let map = CompositeMap::from_entries(entries);

        let json = serde_json::to_value(map.describe()).unwrap();
        assert_eq!(
            json,
            json!({
                "parent": {
                    "kind": "entity",
                    "type": "Folder",
                    "property": "parent",
                    "method": "set",
                    "options": {}
                }
            })
        );
    }
}
