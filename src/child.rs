// Copyright 2025 Cowboy AI, LLC.

//! Child variants, their capabilities and the factories that build them
//!
//! A child is either an [`EntityChild`] (one record) or a
//! [`CollectionChild`] (an ordered list of records). The variant is an
//! explicit [`ChildKind`] tag fixed when a [`ChildType`] is declared, so the
//! sync engine branches on the tag instead of probing instances at runtime.

use crate::errors::{CompositeError, CompositeResult};
use crate::events::Listener;
use crate::options::{Attributes, SetOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Variant tag of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    /// A single structured record
    Entity,
    /// An ordered sequence of records
    Collection,
}

impl ChildKind {
    /// Default update method for this variant
    pub fn default_method(self) -> &'static str {
        match self {
            ChildKind::Entity => "set",
            ChildKind::Collection => "add",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKind::Entity => write!(f, "entity"),
            ChildKind::Collection => write!(f, "collection"),
        }
    }
}

/// A single-record child
pub trait EntityChild: Any + Send + Sync + fmt::Debug {
    /// Name of the child type
    fn type_name(&self) -> &str;

    /// Current attributes
    fn attributes(&self) -> &Attributes;

    /// Merge data through the named update capability
    fn invoke(
        &mut self,
        method: &str,
        attributes: Attributes,
        options: &SetOptions,
    ) -> CompositeResult<()>;

    /// Remove the listed attributes
    fn unset(&mut self, keys: &[String], options: &SetOptions) -> CompositeResult<()>;

    /// Remove every attribute
    fn clear(&mut self, options: &SetOptions) -> CompositeResult<()>;

    /// Register a change listener
    fn subscribe(&mut self, listener: Listener);

    /// Serialized state
    fn to_json(&self) -> Value {
        Value::Object(self.attributes().clone())
    }

    /// Get the child as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Get the child as mutable Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An ordered-collection child
pub trait CollectionChild: Any + Send + Sync + fmt::Debug {
    /// Name of the child type
    fn type_name(&self) -> &str;

    /// Number of members
    fn len(&self) -> usize;

    /// Check if there are no members
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge members through the named update capability
    fn invoke(
        &mut self,
        method: &str,
        items: Vec<Attributes>,
        options: &SetOptions,
    ) -> CompositeResult<()>;

    /// Replace all members
    fn reset(&mut self, items: Vec<Attributes>, options: &SetOptions) -> CompositeResult<()>;

    /// Register a change listener
    fn subscribe(&mut self, listener: Listener);

    /// Serialized members
    fn to_json(&self) -> Value;

    /// Get the child as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Get the child as mutable Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Builds entity children of one type
pub trait EntityFactory: Send + Sync {
    /// Name of the produced type
    fn type_name(&self) -> &str;

    /// Update capabilities of the produced type
    fn methods(&self) -> &[&'static str];

    /// Construct a child holding `attributes`
    fn create(
        &self,
        attributes: Attributes,
        options: &SetOptions,
    ) -> CompositeResult<Box<dyn EntityChild>>;
}

/// Builds collection children of one type
pub trait CollectionFactory: Send + Sync {
    /// Name of the produced type
    fn type_name(&self) -> &str;

    /// Update capabilities of the produced type
    fn methods(&self) -> &[&'static str];

    /// Construct a child holding `items`
    fn create(
        &self,
        items: Vec<Attributes>,
        options: &SetOptions,
    ) -> CompositeResult<Box<dyn CollectionChild>>;
}

/// A declared child type: the variant tag plus the factory for it
#[derive(Clone)]
pub enum ChildType {
    /// Single-record type
    Entity(Arc<dyn EntityFactory>),
    /// Collection type
    Collection(Arc<dyn CollectionFactory>),
}

impl ChildType {
    /// Declare an entity type
    pub fn entity(factory: impl EntityFactory + 'static) -> Self {
        ChildType::Entity(Arc::new(factory))
    }

    /// Declare a collection type
    pub fn collection(factory: impl CollectionFactory + 'static) -> Self {
        ChildType::Collection(Arc::new(factory))
    }

    /// Variant tag
    pub fn kind(&self) -> ChildKind {
        match self {
            ChildType::Entity(_) => ChildKind::Entity,
            ChildType::Collection(_) => ChildKind::Collection,
        }
    }

    /// Name of the type
    pub fn type_name(&self) -> &str {
        match self {
            ChildType::Entity(factory) => factory.type_name(),
            ChildType::Collection(factory) => factory.type_name(),
        }
    }

    /// Update capabilities
    pub fn methods(&self) -> &[&'static str] {
        match self {
            ChildType::Entity(factory) => factory.methods(),
            ChildType::Collection(factory) => factory.methods(),
        }
    }

    /// Check if `method` is an update capability of this type
    pub fn supports(&self, method: &str) -> bool {
        self.methods().contains(&method)
    }

    /// Construct a child, empty when `value` is `None`
    pub fn create(&self, value: Option<Value>, options: &SetOptions) -> CompositeResult<ChildInstance> {
        match self {
            ChildType::Entity(factory) => {
                let attributes = match value {
                    Some(value) => entity_data(factory.type_name(), value)?,
                    None => Attributes::new(),
                };
                factory.create(attributes, options).map(ChildInstance::Entity)
            }
            ChildType::Collection(factory) => {
                let items = match value {
                    Some(value) => collection_data(factory.type_name(), value)?,
                    None => Vec::new(),
                };
                factory.create(items, options).map(ChildInstance::Collection)
            }
        }
    }
}

impl fmt::Debug for ChildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildType")
            .field("kind", &self.kind())
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// A live child held in a host slot
#[derive(Debug)]
pub enum ChildInstance {
    /// Single-record child
    Entity(Box<dyn EntityChild>),
    /// Collection child
    Collection(Box<dyn CollectionChild>),
}

impl ChildInstance {
    /// Variant tag
    pub fn kind(&self) -> ChildKind {
        match self {
            ChildInstance::Entity(_) => ChildKind::Entity,
            ChildInstance::Collection(_) => ChildKind::Collection,
        }
    }

    /// Name of the child's type
    pub fn type_name(&self) -> &str {
        match self {
            ChildInstance::Entity(entity) => entity.type_name(),
            ChildInstance::Collection(collection) => collection.type_name(),
        }
    }

    /// Serialized state of the child
    pub fn to_json(&self) -> Value {
        match self {
            ChildInstance::Entity(entity) => entity.to_json(),
            ChildInstance::Collection(collection) => collection.to_json(),
        }
    }

    /// Check if the child holds no data
    pub fn is_empty(&self) -> bool {
        match self {
            ChildInstance::Entity(entity) => entity.attributes().is_empty(),
            ChildInstance::Collection(collection) => collection.is_empty(),
        }
    }

    /// Borrow as an entity
    pub fn as_entity(&self) -> Option<&dyn EntityChild> {
        match self {
            ChildInstance::Entity(entity) => Some(entity.as_ref()),
            ChildInstance::Collection(_) => None,
        }
    }

    /// Borrow as a mutable entity
    pub fn as_entity_mut(&mut self) -> Option<&mut dyn EntityChild> {
        match self {
            ChildInstance::Entity(entity) => Some(entity.as_mut()),
            ChildInstance::Collection(_) => None,
        }
    }

    /// Borrow as a collection
    pub fn as_collection(&self) -> Option<&dyn CollectionChild> {
        match self {
            ChildInstance::Collection(collection) => Some(collection.as_ref()),
            ChildInstance::Entity(_) => None,
        }
    }

    /// Borrow as a mutable collection
    pub fn as_collection_mut(&mut self) -> Option<&mut dyn CollectionChild> {
        match self {
            ChildInstance::Collection(collection) => Some(collection.as_mut()),
            ChildInstance::Entity(_) => None,
        }
    }

    /// Downcast to the concrete child type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            ChildInstance::Entity(entity) => entity.as_any().downcast_ref::<T>(),
            ChildInstance::Collection(collection) => collection.as_any().downcast_ref::<T>(),
        }
    }

    /// Downcast to the concrete child type, mutably
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self {
            ChildInstance::Entity(entity) => entity.as_any_mut().downcast_mut::<T>(),
            ChildInstance::Collection(collection) => collection.as_any_mut().downcast_mut::<T>(),
        }
    }

    /// Register a listener on the child
    pub fn subscribe(&mut self, listener: Listener) {
        match self {
            ChildInstance::Entity(entity) => entity.subscribe(listener),
            ChildInstance::Collection(collection) => collection.subscribe(listener),
        }
    }

    /// Empty the child: entities drop every attribute, collections reset
    pub fn clear(&mut self, options: &SetOptions) -> CompositeResult<()> {
        match self {
            ChildInstance::Entity(entity) => entity.clear(options),
            ChildInstance::Collection(collection) => collection.reset(Vec::new(), options),
        }
    }

    /// Merge `value` through the named update capability
    ///
    /// The value is checked against the child's shape before anything is
    /// touched. Under a full refresh the child then silently drops the data
    /// the payload no longer carries: entities lose the attributes it lacks,
    /// collections are emptied.
    pub fn update(&mut self, method: &str, value: Value, options: &SetOptions) -> CompositeResult<()> {
        let strips_stale = options.flags.strips_stale();
        match self {
            ChildInstance::Entity(entity) => {
                let attributes = entity_data(entity.type_name(), value)?;
                if strips_stale {
                    let missing: Vec<String> = entity
                        .attributes()
                        .keys()
                        .filter(|key| !attributes.contains_key(key.as_str()))
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        entity.unset(&missing, &options.quiet())?;
                    }
                }
                entity.invoke(method, attributes, options)
            }
            ChildInstance::Collection(collection) => {
                let items = collection_data(collection.type_name(), value)?;
                if strips_stale {
                    collection.reset(Vec::new(), &options.quiet())?;
                }
                collection.invoke(method, items, options)
            }
        }
    }
}

/// Interpret a value as entity attributes
pub fn entity_data(type_name: &str, value: Value) -> CompositeResult<Attributes> {
    match value {
        Value::Object(attributes) => Ok(attributes),
        other => Err(CompositeError::InvalidChildData {
            type_name: type_name.to_string(),
            reason: format!("expected an object, found {}", json_kind(&other)),
        }),
    }
}

/// Interpret a value as collection members: one object or an array of objects
pub fn collection_data(type_name: &str, value: Value) -> CompositeResult<Vec<Attributes>> {
    match value {
        Value::Object(attributes) => Ok(vec![attributes]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(attributes) => Ok(attributes),
                other => Err(CompositeError::InvalidChildData {
                    type_name: type_name.to_string(),
                    reason: format!("member {index} is {}, not an object", json_kind(&other)),
                }),
            })
            .collect(),
        other => Err(CompositeError::InvalidChildData {
            type_name: type_name.to_string(),
            reason: format!("expected an object or an array, found {}", json_kind(&other)),
        }),
    }
}

/// Human-readable JSON kind
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, RecordList, RecordListType, RecordType};
    use serde_json::json;

    fn folder() -> ChildType {
        ChildType::entity(RecordType::new("Folder"))
    }

    fn versions() -> ChildType {
        ChildType::collection(RecordListType::new("Versions", RecordType::new("Version")))
    }

    #[test]
    fn test_default_method_table() {
        assert_eq!(ChildKind::Entity.default_method(), "set");
        assert_eq!(ChildKind::Collection.default_method(), "add");
    }

    #[test]
    fn test_child_type_reports_tag_and_capabilities() {
        let folder = folder();
        assert_eq!(folder.kind(), ChildKind::Entity);
        assert_eq!(folder.type_name(), "Folder");
        assert!(folder.supports("set"));
        assert!(!folder.supports("add"));

        let versions = versions();
        assert_eq!(versions.kind(), ChildKind::Collection);
        assert!(versions.supports("add"));
        assert!(versions.supports("reset"));
        assert!(!versions.supports("dummy"));
    }

    #[test]
    fn test_create_empty_and_populated_children() {
        let options = SetOptions::new();

        let empty = folder().create(None, &options).unwrap();
        assert_eq!(empty.kind(), ChildKind::Entity);
        assert!(empty.is_empty());

        let full = folder().create(Some(json!({"id": 1})), &options).unwrap();
        let record = full.downcast_ref::<Record>().unwrap();
        assert_eq!(record.get("id"), Some(&json!(1)));

        let list = versions()
            .create(Some(json!([{"size": 1}, {"size": 2}])), &options)
            .unwrap();
        assert_eq!(list.downcast_ref::<RecordList>().unwrap().len(), 2);
    }

    #[test]
    fn test_create_rejects_wrong_shapes() {
        let options = SetOptions::new();
        let err = folder().create(Some(json!([1])), &options).unwrap_err();
        assert!(err.is_data_error());

        let err = versions().create(Some(json!([{"size": 1}, 7])), &options).unwrap_err();
        assert_eq!(
            err,
            CompositeError::InvalidChildData {
                type_name: "Versions".to_string(),
                reason: "member 1 is number, not an object".to_string(),
            }
        );
    }

    #[test]
    fn test_single_object_is_one_collection_member() {
        let items = collection_data("Versions", json!({"size": 3})).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("size"), Some(&json!(3)));
    }

    #[test]
    fn test_refresh_update_keeps_only_incoming_keys() {
        let options = SetOptions::new();
        let mut child = folder()
            .create(Some(json!({"id": 1, "name": "a"})), &options)
            .unwrap();

        child
            .update("set", json!({"name": "b"}), &SetOptions::new().full_refresh())
            .unwrap();

        let record = child.downcast_ref::<Record>().unwrap();
        assert!(!record.has("id"));
        assert_eq!(record.get("name"), Some(&json!("b")));
    }

    #[test]
    fn test_refresh_with_wrong_shape_leaves_child_untouched() {
        let options = SetOptions::new();
        let mut entity = folder()
            .create(Some(json!({"id": 1, "name": "a"})), &options)
            .unwrap();
        let mut list = versions()
            .create(Some(json!([{"size": 1}])), &options)
            .unwrap();
        let refresh = SetOptions::new().full_refresh();

        let err = entity.update("set", json!([1]), &refresh).unwrap_err();
        assert!(err.is_data_error());
        assert_eq!(entity.to_json(), json!({"id": 1, "name": "a"}));

        let err = list.update("add", json!([{"size": 2}, 7]), &refresh).unwrap_err();
        assert!(err.is_data_error());
        assert_eq!(list.to_json(), json!([{"size": 1}]));
    }
}
