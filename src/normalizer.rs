// Copyright 2025 Cowboy AI, LLC.

//! Descriptor normalizer: raw composite configuration to [`CompositeMap`]
//!
//! Two configuration sources are accepted, class-level and instance-level.
//! Each is either a declared JSON object or a function of the host that
//! returns one. Entries are merged key by key, instance-level entries
//! replacing class-level ones, and every merged entry is normalized on its
//! own. Every entry is checked before the map is returned, so a rejected
//! configuration never leaves partial state behind.
//!
//! Entry shapes:
//!
//! ```json
//! {
//!   "parent_expanded": { "type": "Folder", "property": "parent" },
//!   "versions": "Versions"
//! }
//! ```
//!
//! The string form is shorthand for `{ "type": <name> }`. The object form
//! accepts `type` (required), `property`, `options`, `method` and `parse`.

use crate::child::{json_kind, ChildType};
use crate::descriptor::{ChildDescriptor, CompositeMap};
use crate::errors::{CompositeError, CompositeResult};
use crate::registry::{ParseFn, TypeRegistry};
use crate::sync_engine::CompositeHost;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Function producing a configuration object, called with the host as context
pub type ConfigCallback = dyn Fn(&dyn CompositeHost) -> CompositeResult<Value> + Send + Sync;

/// One source of composite configuration
#[derive(Clone)]
pub enum CompositeConfig {
    /// A literal configuration value
    Declared(Value),
    /// A configuration computed from the host
    Computed(Arc<ConfigCallback>),
}

impl CompositeConfig {
    /// Literal configuration
    pub fn declared(value: Value) -> Self {
        CompositeConfig::Declared(value)
    }

    /// Configuration computed from the host at construction time
    pub fn computed<F>(func: F) -> Self
    where
        F: Fn(&dyn CompositeHost) -> CompositeResult<Value> + Send + Sync + 'static,
    {
        CompositeConfig::Computed(Arc::new(func))
    }

    /// Parse literal configuration from JSON text
    pub fn from_json_str(text: &str) -> CompositeResult<Self> {
        Ok(CompositeConfig::Declared(serde_json::from_str(text)?))
    }

    fn evaluate(&self, host: &dyn CompositeHost) -> CompositeResult<Value> {
        match self {
            CompositeConfig::Declared(value) => Ok(value.clone()),
            CompositeConfig::Computed(func) => func(host),
        }
    }
}

impl fmt::Debug for CompositeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeConfig::Declared(value) => f.debug_tuple("Declared").field(value).finish(),
            CompositeConfig::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Value> for CompositeConfig {
    fn from(value: Value) -> Self {
        CompositeConfig::Declared(value)
    }
}

/// Turns raw configuration into a validated [`CompositeMap`]
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> Normalizer<'a> {
    /// Normalizer resolving type and parse names through `registry`
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Merge both sources and normalize every entry
    ///
    /// # Errors
    ///
    /// Returns a configuration error (see [`CompositeError::is_config_error`])
    /// for the first entry that cannot be normalized.
    pub fn normalize(
        &self,
        class_config: Option<&CompositeConfig>,
        instance_config: Option<&CompositeConfig>,
        host: &dyn CompositeHost,
    ) -> CompositeResult<CompositeMap> {
        let mut merged: IndexMap<String, Value> = IndexMap::new();
        for (source_name, config) in [("class", class_config), ("instance", instance_config)] {
            if let Some(entries) = evaluate_source(source_name, config, host)? {
                merged.extend(entries);
            }
        }

        let mut entries = IndexMap::with_capacity(merged.len());
        let mut claimed: HashMap<String, String> = HashMap::new();
        for (attribute, raw) in merged {
            let descriptor = self.normalize_entry(&attribute, raw, host)?;
            if let Some(first) = claimed.insert(descriptor.property.clone(), attribute.clone()) {
                return Err(CompositeError::DuplicateProperty {
                    property: descriptor.property,
                    first,
                    second: attribute,
                });
            }
            entries.insert(attribute, descriptor);
        }

        debug!(descriptors = entries.len(), "composite map built");
        Ok(CompositeMap::from_entries(entries))
    }

    fn normalize_entry(
        &self,
        attribute: &str,
        raw: Value,
        host: &dyn CompositeHost,
    ) -> CompositeResult<ChildDescriptor> {
        let (declared_type, property, options, method, parse) = match raw {
            Value::String(name) => (Value::String(name), None, Map::new(), None, None),
            Value::Object(mut fields) => {
                let parse = self.parse_fn(attribute, fields.remove("parse"))?;
                let declared_type = fields
                    .remove("type")
                    .filter(|value| !value.is_null())
                    .ok_or_else(|| CompositeError::MissingChildType {
                        attribute: attribute.to_string(),
                    })?;
                let property = optional_name(attribute, "property", fields.remove("property"))?;
                let method = optional_name(attribute, "method", fields.remove("method"))?;
                let options = match fields.remove("options") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(options)) => options,
                    Some(other) => {
                        return Err(CompositeError::invalid_descriptor(
                            attribute,
                            format!("options must be an object, found {}", json_kind(&other)),
                        ))
                    }
                };
                (declared_type, property, options, method, parse)
            }
            other => {
                return Err(CompositeError::invalid_descriptor(
                    attribute,
                    format!("expected a type name or an object, found {}", json_kind(&other)),
                ))
            }
        };

        let child_type = self.child_type(attribute, &declared_type)?;

        let property = property.unwrap_or_else(|| attribute.to_string());
        if host.is_member(&property) {
            return Err(CompositeError::PropertyConflict {
                attribute: attribute.to_string(),
                property,
            });
        }

        let method = method.unwrap_or_else(|| child_type.kind().default_method().to_string());
        if !child_type.supports(&method) {
            return Err(CompositeError::UnknownUpdateMethod {
                attribute: attribute.to_string(),
                method,
                type_name: child_type.type_name().to_string(),
            });
        }

        Ok(ChildDescriptor {
            attribute: attribute.to_string(),
            child_type,
            property,
            method,
            options,
            parse,
        })
    }

    fn child_type(&self, attribute: &str, declared: &Value) -> CompositeResult<ChildType> {
        declared
            .as_str()
            .and_then(|name| self.registry.child_type(name))
            .cloned()
            .ok_or_else(|| CompositeError::UnknownChildType {
                attribute: attribute.to_string(),
                type_name: declared.to_string(),
            })
    }

    fn parse_fn(&self, attribute: &str, declared: Option<Value>) -> CompositeResult<Option<ParseFn>> {
        match declared {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(name)) => self
                .registry
                .parser(&name)
                .cloned()
                .map(Some)
                .ok_or_else(|| CompositeError::InvalidParseFunction {
                    attribute: attribute.to_string(),
                }),
            Some(_) => Err(CompositeError::InvalidParseFunction {
                attribute: attribute.to_string(),
            }),
        }
    }
}

fn evaluate_source(
    source_name: &str,
    config: Option<&CompositeConfig>,
    host: &dyn CompositeHost,
) -> CompositeResult<Option<Map<String, Value>>> {
    let Some(config) = config else {
        return Ok(None);
    };
    match config.evaluate(host)? {
        Value::Null => Ok(None),
        Value::Object(entries) => Ok(Some(entries)),
        other => Err(CompositeError::InvalidConfiguration {
            source_name: source_name.to_string(),
            found: json_kind(&other).to_string(),
        }),
    }
}

/// A string field that falls back to the default when absent or empty
fn optional_name(attribute: &str, field: &str, value: Option<Value>) -> CompositeResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) if name.is_empty() => Ok(None),
        Some(Value::String(name)) => Ok(Some(name)),
        Some(other) => Err(CompositeError::invalid_descriptor(
            attribute,
            format!("{field} must be a string, found {}", json_kind(&other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::{ChildInstance, ChildKind};
    use crate::options::Attributes;
    use crate::record::{RecordListType, RecordType};
    use serde_json::json;

    struct BareHost {
        attributes: Attributes,
    }

    impl CompositeHost for BareHost {
        fn attributes(&self) -> &Attributes {
            &self.attributes
        }

        fn is_member(&self, name: &str) -> bool {
            matches!(name, "set" | "fetch")
        }

        fn slot(&self, _property: &str) -> Option<&ChildInstance> {
            None
        }

        fn slot_mut(&mut self, _property: &str) -> Option<&mut ChildInstance> {
            None
        }

        fn fill_slot(&mut self, _property: &str, _child: ChildInstance) {}
    }

    fn host() -> BareHost {
        BareHost {
            attributes: Attributes::new(),
        }
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(ChildType::entity(RecordType::new("Folder")))
            .with_type(ChildType::collection(RecordListType::new(
                "Versions",
                RecordType::new("Version"),
            )))
            .with_parser("identity", |_, value, _| Ok(value))
    }

    #[test]
    fn test_shorthand_and_verbose_entries() {
        let registry = registry();
        let config = CompositeConfig::declared(json!({
            "parent_expanded": {"type": "Folder", "property": "parent", "options": {"deep": true}},
            "versions": "Versions"
        }));

        let map = Normalizer::new(&registry)
            .normalize(Some(&config), None, &host())
            .unwrap();

        let parent = map.get("parent_expanded").unwrap();
        assert_eq!(parent.property, "parent");
        assert_eq!(parent.method, "set");
        assert_eq!(parent.options.get("deep"), Some(&json!(true)));

        let versions = map.get("versions").unwrap();
        assert_eq!(versions.kind(), ChildKind::Collection);
        assert_eq!(versions.property, "versions");
        assert_eq!(versions.method, "add");
    }

    #[test]
    fn test_instance_entries_override_in_place() {
        let registry = registry();
        let class = CompositeConfig::declared(json!({"a": "Folder", "b": "Folder"}));
        let instance = CompositeConfig::declared(json!({"c": "Folder", "a": "Versions"}));

        let map = Normalizer::new(&registry)
            .normalize(Some(&class), Some(&instance), &host())
            .unwrap();

        assert_eq!(map.attributes().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(map.get("a").map(ChildDescriptor::kind), Some(ChildKind::Collection));
    }

    #[test]
    fn test_computed_config_sees_host() {
        let registry = registry();
        let config = CompositeConfig::computed(|host| {
            let attribute = host
                .get("child_key")
                .and_then(Value::as_str)
                .unwrap_or("fallback")
                .to_string();
            let mut config = Map::new();
            config.insert(attribute, json!("Folder"));
            Ok(Value::Object(config))
        });
        let mut bare = host();
        bare.attributes.insert("child_key".to_string(), json!("owner"));

        let map = Normalizer::new(&registry).normalize(None, Some(&config), &bare).unwrap();

        assert!(map.contains("owner"));
    }

    #[test]
    fn test_null_sources_are_absent() {
        let registry = registry();
        let map = Normalizer::new(&registry)
            .normalize(Some(&CompositeConfig::declared(Value::Null)), None, &host())
            .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_empty_property_falls_back_to_attribute() {
        let registry = registry();
        let config = CompositeConfig::declared(json!({"owner": {"type": "Folder", "property": ""}}));
        let map = Normalizer::new(&registry).normalize(Some(&config), None, &host()).unwrap();
        assert_eq!(map.get("owner").map(|d| d.property.as_str()), Some("owner"));
    }

    #[test]
    fn test_renaming_avoids_member_conflict() {
        let registry = registry();
        let config = CompositeConfig::declared(json!({"fetch": {"type": "Folder", "property": "submodel"}}));
        let map = Normalizer::new(&registry).normalize(Some(&config), None, &host()).unwrap();
        assert!(map.by_property("submodel").is_some());

        let conflicting = CompositeConfig::declared(json!({"fetch": "Folder"}));
        let err = Normalizer::new(&registry)
            .normalize(Some(&conflicting), None, &host())
            .unwrap_err();
        assert!(matches!(err, CompositeError::PropertyConflict { .. }));
    }

    #[test]
    fn test_duplicate_property_is_rejected() {
        let registry = registry();
        let config = CompositeConfig::declared(json!({
            "a": {"type": "Folder", "property": "shared"},
            "b": {"type": "Folder", "property": "shared"}
        }));
        let err = Normalizer::new(&registry).normalize(Some(&config), None, &host()).unwrap_err();
        assert_eq!(
            err,
            CompositeError::DuplicateProperty {
                property: "shared".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_config_from_json_text() {
        let config = CompositeConfig::from_json_str(r#"{"versions": {"type": "Versions", "method": "reset"}}"#)
            .unwrap();
        let registry = registry();
        let map = Normalizer::new(&registry).normalize(Some(&config), None, &host()).unwrap();
        assert_eq!(map.get("versions").map(|d| d.method.as_str()), Some("reset"));

        assert!(CompositeConfig::from_json_str("{ nope").is_err());
    }
}
