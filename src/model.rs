// Copyright 2025 Cowboy AI, LLC.

//! Composite host records
//!
//! A [`ModelClass`] holds what every instance shares: class-level composite
//! configuration, default attributes, the type registry and an optional
//! validator. A [`CompositeModel`] is one host instance. It owns the flat
//! attribute store and the child slots and keeps the children in sync with
//! every attribute-setting call.
//!
//! # Example
//!
//! ```rust
//! use cim_composite::{ChildType, CompositeModel, ModelClass, ModelOptions, RecordType, SetOptions};
//! use serde_json::json;
//!
//! let class = ModelClass::builder("File")
//!     .register(ChildType::entity(RecordType::new("Folder")))
//!     .composite(json!({ "parent": "Folder" }))
//!     .build();
//!
//! let mut file = CompositeModel::new(&class, Default::default(), ModelOptions::new()).unwrap();
//! assert!(file.record("parent").unwrap().is_empty());
//!
//! file.set_value("parent", json!({ "id": 1, "name": "Employee" }), &SetOptions::new()).unwrap();
//! assert_eq!(file.record("parent").and_then(|p| p.get("name")), Some(&json!("Employee")));
//! ```

use crate::backend::Backend;
use crate::child::{ChildInstance, ChildType, CollectionChild, EntityChild};
use crate::descriptor::CompositeMap;
use crate::errors::CompositeResult;
use crate::events::{Listener, Listeners, ModelEvent};
use crate::normalizer::{CompositeConfig, Normalizer};
use crate::options::{Attributes, SetOptions};
use crate::record::{Record, RecordList, Validator};
use crate::registry::{ParseFn, TypeRegistry};
use crate::sync_engine::{sync, CompositeHost};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Shared definition of a kind of composite host
#[derive(Clone)]
pub struct ModelClass {
    name: String,
    composite: Option<CompositeConfig>,
    defaults: Attributes,
    registry: Arc<TypeRegistry>,
    validator: Option<Validator>,
    members: Vec<String>,
}

impl ModelClass {
    /// Start declaring a class
    pub fn builder(name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder {
            class: ModelClass {
                name: name.into(),
                composite: None,
                defaults: Attributes::new(),
                registry: Arc::new(TypeRegistry::new()),
                validator: None,
                members: Vec::new(),
            },
        }
    }

    /// Start declaring a subclass that inherits everything from this one
    ///
    /// Hosts of the new class build their own composite maps.
    pub fn extend(&self, name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder {
            class: ModelClass {
                name: name.into(),
                ..self.clone()
            },
        }
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class-level composite configuration
    pub fn composite(&self) -> Option<&CompositeConfig> {
        self.composite.as_ref()
    }

    /// Default attributes
    pub fn defaults(&self) -> &Attributes {
        &self.defaults
    }

    /// Types and parse functions known to this class
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Extra member names child properties must not take
    pub fn members(&self) -> &[String] {
        &self.members
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name)
            .field("composite", &self.composite)
            .field("defaults", &self.defaults)
            .field("registry", &self.registry)
            .field("validated", &self.validator.is_some())
            .field("members", &self.members)
            .finish()
    }
}

/// Builder for [`ModelClass`]
pub struct ModelClassBuilder {
    class: ModelClass,
}

impl ModelClassBuilder {
    /// Class-level composite configuration, replacing any inherited one
    pub fn composite(mut self, config: impl Into<CompositeConfig>) -> Self {
        self.class.composite = Some(config.into());
        self
    }

    /// Default attributes for new instances
    pub fn defaults(mut self, defaults: Attributes) -> Self {
        self.class.defaults = defaults;
        self
    }

    /// Replace the type registry
    pub fn registry(mut self, registry: TypeRegistry) -> Self {
        self.class.registry = Arc::new(registry);
        self
    }

    /// Add a child type to the registry
    pub fn register(mut self, child_type: ChildType) -> Self {
        Arc::make_mut(&mut self.class.registry).register(child_type);
        self
    }

    /// Add a parse function to the registry
    pub fn parser<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn CompositeHost, Value, &SetOptions) -> CompositeResult<Value> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.class.registry).register_parser(ParseFn::new(name, func));
        self
    }

    /// Validator checked by validating sets and saves
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Attributes) -> Result<(), String> + Send + Sync + 'static,
    {
        self.class.validator = Some(Arc::new(validator));
        self
    }

    /// Reserve an extra member name
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.class.members.push(name.into());
        self
    }

    /// Finish the class
    pub fn build(self) -> Arc<ModelClass> {
        Arc::new(self.class)
    }
}

/// Per-instance construction options
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Instance-level composite configuration
    pub composite: Option<CompositeConfig>,
    /// Options of the construction-time synchronization
    pub set: SetOptions,
}

impl ModelOptions {
    /// No instance configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance-level composite configuration
    pub fn composite(mut self, config: impl Into<CompositeConfig>) -> Self {
        self.composite = Some(config.into());
        self
    }

    /// Options forwarded to the children built at construction
    pub fn with_set_options(mut self, set: SetOptions) -> Self {
        self.set = set;
        self
    }
}

/// A host record whose selected attributes back live child records
#[derive(Debug)]
pub struct CompositeModel {
    cid: Uuid,
    class: Arc<ModelClass>,
    attributes: Attributes,
    children: IndexMap<String, ChildInstance>,
    composite: Arc<CompositeMap>,
    listeners: Listeners,
    validation_error: Option<String>,
}

impl CompositeModel {
    /// Names a child property may not take
    pub const MEMBERS: &'static [&'static str] = &[
        "attributes",
        "child",
        "child_mut",
        "children",
        "cid",
        "class",
        "clear",
        "collection",
        "collection_mut",
        "composite_map",
        "entity",
        "entity_mut",
        "fetch",
        "get",
        "has",
        "id",
        "record",
        "record_list",
        "save",
        "set",
        "set_value",
        "subscribe",
        "to_json",
        "unset",
        "validation_error",
    ];

    /// Construct a host and its children
    ///
    /// Defaults are laid under `attributes`, the composite map is built from
    /// the class and `options`, and one synchronization pass creates every
    /// child. A configuration error aborts construction before any child
    /// exists.
    pub fn new(
        class: &Arc<ModelClass>,
        attributes: Attributes,
        options: ModelOptions,
    ) -> CompositeResult<Self> {
        let mut initial = class.defaults.clone();
        initial.extend(attributes);

        let mut model = Self {
            cid: Uuid::new_v4(),
            class: Arc::clone(class),
            attributes: initial,
            children: IndexMap::new(),
            composite: Arc::new(CompositeMap::default()),
            listeners: Listeners::new(),
            validation_error: None,
        };
        model.make_composite(&options)?;
        Ok(model)
    }

    fn make_composite(&mut self, options: &ModelOptions) -> CompositeResult<()> {
        let class = Arc::clone(&self.class);
        let map = Normalizer::new(class.registry()).normalize(
            class.composite(),
            options.composite.as_ref(),
            &*self,
        )?;
        self.composite = Arc::new(map);
        debug!(class = %class.name, cid = %self.cid, "composite initialized");

        let initial = self.attributes.clone();
        let set = options.set.clone().create_missing();
        let composite = Arc::clone(&self.composite);
        sync(&composite, self, &initial, &set)
    }

    /// Assign attributes, then synchronize the children they back
    ///
    /// Returns `Ok(false)` when a validating set is rejected by the class
    /// validator; nothing is assigned or synchronized then. Child data
    /// errors propagate after the host attributes have been assigned.
    pub fn set(&mut self, attributes: Attributes, options: &SetOptions) -> CompositeResult<bool> {
        if attributes.is_empty() {
            return Ok(true);
        }
        if options.flags.validating && !self.validate(&attributes, options) {
            return Ok(false);
        }

        let changed = self.assign(&attributes, options);
        if !changed.is_empty() && !options.silent {
            self.listeners.emit(&ModelEvent::Change { changed });
        }

        let composite = Arc::clone(&self.composite);
        sync(&composite, self, &attributes, options)?;
        Ok(true)
    }

    /// Key/value form of [`CompositeModel::set`]
    pub fn set_value(&mut self, key: impl Into<String>, value: Value, options: &SetOptions) -> CompositeResult<bool> {
        let mut attributes = Attributes::new();
        attributes.insert(key.into(), value);
        self.set(attributes, options)
    }

    /// Remove one attribute, clearing the child it backs
    pub fn unset(&mut self, key: impl Into<String>, options: &SetOptions) -> CompositeResult<bool> {
        self.set_value(key, Value::Null, &options.clone().unsetting())
    }

    /// Remove every attribute, clearing the children they back
    pub fn clear(&mut self, options: &SetOptions) -> CompositeResult<bool> {
        let attributes: Attributes = self
            .attributes
            .keys()
            .map(|key| (key.clone(), Value::Null))
            .collect();
        self.set(attributes, &options.clone().unsetting())
    }

    /// Reload the host from `backend` as a full refresh
    pub fn fetch(&mut self, backend: &dyn Backend, options: &SetOptions) -> CompositeResult<bool> {
        let response = backend.read(self)?;
        let applied = self.set(response, &options.clone().full_refresh())?;
        if applied {
            self.listeners.emit(&ModelEvent::Sync);
        }
        Ok(applied)
    }

    /// Validate and assign `attributes`, write the host through `backend`
    /// and apply the possibly partial response
    pub fn save(
        &mut self,
        attributes: Attributes,
        backend: &dyn Backend,
        options: &SetOptions,
    ) -> CompositeResult<bool> {
        let options = options.clone().validating();
        if attributes.is_empty() {
            let current = self.attributes.clone();
            if !self.validate(&current, &SetOptions::new()) {
                return Ok(false);
            }
        } else if !self.set(attributes, &options)? {
            return Ok(false);
        }

        let response = backend.write(self)?;
        let applied = self.set(response, &options.full_refresh())?;
        if applied {
            self.listeners.emit(&ModelEvent::Sync);
        }
        Ok(applied)
    }

    /// Attributes with every composite key replaced by its child's state
    pub fn to_json(&self) -> Value {
        let mut json = self.attributes.clone();
        for descriptor in self.composite.iter() {
            if let Some(child) = self.children.get(&descriptor.property) {
                json.insert(descriptor.attribute.clone(), child.to_json());
            }
        }
        Value::Object(json)
    }

    /// Client-side identity, unique per instance
    pub fn cid(&self) -> Uuid {
        self.cid
    }

    /// The class this host was built from
    pub fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    /// The `id` attribute, if any
    pub fn id(&self) -> Option<&Value> {
        self.attributes.get("id")
    }

    /// Read one attribute
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Check if an attribute is present and not null
    pub fn has(&self, key: &str) -> bool {
        self.attributes.get(key).is_some_and(|value| !value.is_null())
    }

    /// The flat attribute store
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The composite map this host was built with
    pub fn composite_map(&self) -> &Arc<CompositeMap> {
        &self.composite
    }

    /// Child slots in creation order
    pub fn children(&self) -> impl Iterator<Item = (&str, &ChildInstance)> {
        self.children.iter().map(|(property, child)| (property.as_str(), child))
    }

    /// Child held under `property`
    pub fn child(&self, property: &str) -> Option<&ChildInstance> {
        self.children.get(property)
    }

    /// Mutable child held under `property`
    pub fn child_mut(&mut self, property: &str) -> Option<&mut ChildInstance> {
        self.children.get_mut(property)
    }

    /// Entity child held under `property`
    pub fn entity(&self, property: &str) -> Option<&dyn EntityChild> {
        self.child(property).and_then(ChildInstance::as_entity)
    }

    /// Mutable entity child held under `property`
    pub fn entity_mut(&mut self, property: &str) -> Option<&mut dyn EntityChild> {
        self.child_mut(property).and_then(ChildInstance::as_entity_mut)
    }

    /// Collection child held under `property`
    pub fn collection(&self, property: &str) -> Option<&dyn CollectionChild> {
        self.child(property).and_then(ChildInstance::as_collection)
    }

    /// Mutable collection child held under `property`
    pub fn collection_mut(&mut self, property: &str) -> Option<&mut dyn CollectionChild> {
        self.child_mut(property).and_then(ChildInstance::as_collection_mut)
    }

    /// Built-in [`Record`] held under `property`
    pub fn record(&self, property: &str) -> Option<&Record> {
        self.child(property).and_then(|child| child.downcast_ref::<Record>())
    }

    /// Built-in [`RecordList`] held under `property`
    pub fn record_list(&self, property: &str) -> Option<&RecordList> {
        self.child(property).and_then(|child| child.downcast_ref::<RecordList>())
    }

    /// Message of the last rejected validating set
    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    /// Register a listener for host events
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.subscribe(listener);
    }

    /// Run the class validator over the attributes `attributes` would produce
    fn validate(&mut self, attributes: &Attributes, options: &SetOptions) -> bool {
        let Some(validator) = self.class.validator.clone() else {
            return true;
        };
        let mut candidate = self.attributes.clone();
        for (key, value) in attributes {
            if options.flags.unsetting {
                candidate.remove(key);
            } else {
                candidate.insert(key.clone(), value.clone());
            }
        }
        match validator(&candidate) {
            Ok(()) => {
                self.validation_error = None;
                true
            }
            Err(reason) => {
                warn!(class = %self.class.name, cid = %self.cid, %reason, "validation rejected attributes");
                self.listeners.emit(&ModelEvent::Invalid {
                    reason: reason.clone(),
                });
                self.validation_error = Some(reason);
                false
            }
        }
    }

    fn assign(&mut self, attributes: &Attributes, options: &SetOptions) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in attributes {
            if options.flags.unsetting {
                if self.attributes.remove(key).is_some() {
                    changed.push(key.clone());
                }
            } else if self.attributes.get(key) != Some(value) {
                self.attributes.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }
        changed
    }
}

impl CompositeHost for CompositeModel {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn is_member(&self, name: &str) -> bool {
        Self::MEMBERS.contains(&name) || self.class.members.iter().any(|member| member == name)
    }

    fn slot(&self, property: &str) -> Option<&ChildInstance> {
        self.children.get(property)
    }

    fn slot_mut(&mut self, property: &str) -> Option<&mut ChildInstance> {
        self.children.get_mut(property)
    }

    fn fill_slot(&mut self, property: &str, child: ChildInstance) {
        self.children.insert(property.to_string(), child);
    }
}
