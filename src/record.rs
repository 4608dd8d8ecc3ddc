// Copyright 2025 Cowboy AI, LLC.

//! Built-in record and record-list children
//!
//! [`Record`] is the stock entity child: a flat attribute map with an
//! optional validator and change listeners. [`RecordList`] is the stock
//! collection child: an ordered list of records built by an item
//! [`RecordType`]. Both emit [`ModelEvent`]s the way a host does.

use crate::child::{CollectionChild, CollectionFactory, EntityChild, EntityFactory};
use crate::errors::{CompositeError, CompositeResult};
use crate::events::{Listener, Listeners, ModelEvent};
use crate::options::{Attributes, SetOptions};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Check run on the attributes a record would hold after an update
pub type Validator = Arc<dyn Fn(&Attributes) -> Result<(), String> + Send + Sync>;

/// Update capabilities of [`Record`]
pub const RECORD_METHODS: &[&str] = &["set", "replace"];

/// Update capabilities of [`RecordList`]
pub const RECORD_LIST_METHODS: &[&str] = &["add", "reset", "set"];

/// A single record with change notifications
#[derive(Clone)]
pub struct Record {
    cid: Uuid,
    type_name: String,
    attributes: Attributes,
    validator: Option<Validator>,
    listeners: Listeners,
}

impl Record {
    /// Create a record without validation
    pub fn new(type_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            cid: Uuid::new_v4(),
            type_name: type_name.into(),
            attributes,
            validator: None,
            listeners: Listeners::new(),
        }
    }

    /// Client-side identity, unique per instance
    pub fn cid(&self) -> Uuid {
        self.cid
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

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the record holds no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Merge attributes, returning the keys that changed
    pub fn set(&mut self, attributes: Attributes, options: &SetOptions) -> CompositeResult<Vec<String>> {
        if !options.flags.unsetting {
            let mut candidate = self.attributes.clone();
            candidate.extend(attributes.clone());
            self.check(&candidate)?;
        }
        Ok(self.assign(attributes, options))
    }

    /// Merge attributes and drop every key `attributes` does not carry
    pub fn replace(&mut self, attributes: Attributes, options: &SetOptions) -> CompositeResult<Vec<String>> {
        self.check(&attributes)?;
        let mut changed: Vec<String> = self
            .attributes
            .keys()
            .filter(|key| !attributes.contains_key(key.as_str()))
            .cloned()
            .collect();
        for key in &changed {
            self.attributes.remove(key);
        }
        for (key, value) in attributes {
            if self.attributes.get(&key) != Some(&value) {
                self.attributes.insert(key.clone(), value);
                changed.push(key);
            }
        }
        self.notify_change(&changed, options);
        Ok(changed)
    }

    /// Remove the listed attributes, returning the keys that were present
    pub fn remove_keys(&mut self, keys: &[String], options: &SetOptions) -> Vec<String> {
        let changed: Vec<String> = keys
            .iter()
            .filter(|key| self.attributes.remove(key.as_str()).is_some())
            .cloned()
            .collect();
        self.notify_change(&changed, options);
        changed
    }

    /// Run the validator against candidate attributes
    pub fn check(&self, candidate: &Attributes) -> CompositeResult<()> {
        match &self.validator {
            Some(validator) => validator(candidate).map_err(CompositeError::Validation),
            None => Ok(()),
        }
    }

    /// Apply an already validated merge
    fn assign(&mut self, attributes: Attributes, options: &SetOptions) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in attributes {
            if options.flags.unsetting {
                if self.attributes.remove(&key).is_some() {
                    changed.push(key);
                }
            } else if self.attributes.get(&key) != Some(&value) {
                self.attributes.insert(key.clone(), value);
                changed.push(key);
            }
        }
        self.notify_change(&changed, options);
        changed
    }

    fn notify_change(&self, changed: &[String], options: &SetOptions) {
        if !changed.is_empty() && !options.silent {
            self.listeners.emit(&ModelEvent::Change {
                changed: changed.to_vec(),
            });
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("cid", &self.cid)
            .field("type_name", &self.type_name)
            .field("attributes", &self.attributes)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

impl EntityChild for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn invoke(
        &mut self,
        method: &str,
        attributes: Attributes,
        options: &SetOptions,
    ) -> CompositeResult<()> {
        match method {
            "set" => self.set(attributes, options).map(|_| ()),
            "replace" => self.replace(attributes, options).map(|_| ()),
            other => Err(unsupported(&self.type_name, other)),
        }
    }

    fn unset(&mut self, keys: &[String], options: &SetOptions) -> CompositeResult<()> {
        self.remove_keys(keys, options);
        Ok(())
    }

    fn clear(&mut self, options: &SetOptions) -> CompositeResult<()> {
        let keys: Vec<String> = self.attributes.keys().cloned().collect();
        self.remove_keys(&keys, options);
        Ok(())
    }

    fn subscribe(&mut self, listener: Listener) {
        self.listeners.subscribe(listener);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Factory for [`Record`]s of one named type
#[derive(Clone)]
pub struct RecordType {
    name: String,
    defaults: Attributes,
    validator: Option<Validator>,
}

impl RecordType {
    /// Declare a record type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Attributes::new(),
            validator: None,
        }
    }

    /// Attributes every new record starts with
    pub fn with_defaults(mut self, defaults: Attributes) -> Self {
        self.defaults = defaults;
        self
    }

    /// Validator run on every incoming update
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Attributes) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Name of the type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a validated record from defaults overlaid with `attributes`
    pub fn build(&self, attributes: Attributes) -> CompositeResult<Record> {
        let mut merged = self.defaults.clone();
        merged.extend(attributes);
        let mut record = Record::new(self.name.clone(), merged);
        record.validator = self.validator.clone();
        record.check(&record.attributes)?;
        Ok(record)
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl EntityFactory for RecordType {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> &[&'static str] {
        RECORD_METHODS
    }

    fn create(
        &self,
        attributes: Attributes,
        _options: &SetOptions,
    ) -> CompositeResult<Box<dyn EntityChild>> {
        Ok(Box::new(self.build(attributes)?))
    }
}

/// An ordered list of [`Record`]s
#[derive(Clone)]
pub struct RecordList {
    cid: Uuid,
    type_name: String,
    model: RecordType,
    members: Vec<Record>,
    listeners: Listeners,
}

enum MergeStep {
    Existing(usize, Attributes),
    Fresh(Record),
}

impl RecordList {
    /// Create an empty list whose members are built by `model`
    pub fn new(type_name: impl Into<String>, model: RecordType) -> Self {
        Self {
            cid: Uuid::new_v4(),
            type_name: type_name.into(),
            model,
            members: Vec::new(),
            listeners: Listeners::new(),
        }
    }

    /// Client-side identity, unique per instance
    pub fn cid(&self) -> Uuid {
        self.cid
    }

    /// Member at `index`
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.members.get(index)
    }

    /// First member
    pub fn first(&self) -> Option<&Record> {
        self.members.first()
    }

    /// Last member
    pub fn last(&self) -> Option<&Record> {
        self.members.last()
    }

    /// Member whose `id` attribute equals `id`
    pub fn find_by_id(&self, id: &Value) -> Option<&Record> {
        self.members.iter().find(|member| member.id() == Some(id))
    }

    /// Iterate over members in order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.members.iter()
    }

    /// Values of one attribute across members, `Null` where missing
    pub fn pluck(&self, key: &str) -> Vec<Value> {
        self.members
            .iter()
            .map(|member| member.get(key).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Append members, skipping items whose `id` is already present
    ///
    /// Returns the number of members appended. Items without an `id`, or
    /// with a `null` one, are always appended.
    pub fn add(&mut self, items: Vec<Attributes>, options: &SetOptions) -> CompositeResult<usize> {
        let fresh = self.build_unique(items, &self.members)?;
        let count = fresh.len();
        self.members.extend(fresh);
        if count > 0 && !options.silent {
            self.listeners.emit(&ModelEvent::Add { count });
        }
        Ok(count)
    }

    /// Replace all members
    pub fn reset_members(&mut self, items: Vec<Attributes>, options: &SetOptions) -> CompositeResult<()> {
        self.members = self.build_unique(items, &[])?;
        if !options.silent {
            self.listeners.emit(&ModelEvent::Reset {
                len: self.members.len(),
            });
        }
        Ok(())
    }

    /// Merge members by `id`: matches are updated, unknown items appended,
    /// members missing from `items` removed
    pub fn merge(&mut self, items: Vec<Attributes>, options: &SetOptions) -> CompositeResult<()> {
        let mut claimed = vec![false; self.members.len()];
        let mut plan = Vec::with_capacity(items.len());
        for item in items {
            let matched = item.get("id").filter(|id| !id.is_null()).and_then(|id| {
                self.members
                    .iter()
                    .enumerate()
                    .position(|(index, member)| !claimed[index] && member.id() == Some(id))
            });
            match matched {
                Some(index) => {
                    let mut candidate = self.members[index].attributes.clone();
                    candidate.extend(item.clone());
                    self.members[index].check(&candidate)?;
                    claimed[index] = true;
                    plan.push(MergeStep::Existing(index, item));
                }
                None => plan.push(MergeStep::Fresh(self.model.build(item)?)),
            }
        }

        let mut previous: Vec<Option<Record>> =
            std::mem::take(&mut self.members).into_iter().map(Some).collect();
        let mut added = 0;
        for step in plan {
            match step {
                MergeStep::Existing(index, attributes) => {
                    if let Some(mut member) = previous[index].take() {
                        member.assign(attributes, options);
                        self.members.push(member);
                    }
                }
                MergeStep::Fresh(record) => {
                    self.members.push(record);
                    added += 1;
                }
            }
        }
        let removed = previous.iter().flatten().count();

        if !options.silent {
            if removed > 0 {
                self.listeners.emit(&ModelEvent::Remove { count: removed });
            }
            if added > 0 {
                self.listeners.emit(&ModelEvent::Add { count: added });
            }
        }
        Ok(())
    }

    /// Build records for `items`, dropping those whose non-null `id` is
    /// already carried by `known` or by an earlier item
    fn build_unique(&self, items: Vec<Attributes>, known: &[Record]) -> CompositeResult<Vec<Record>> {
        let mut fresh: Vec<Record> = Vec::with_capacity(items.len());
        for item in items {
            let duplicate = item.get("id").filter(|id| !id.is_null()).is_some_and(|id| {
                known
                    .iter()
                    .chain(fresh.iter())
                    .any(|member| member.id() == Some(id))
            });
            if !duplicate {
                fresh.push(self.model.build(item)?);
            }
        }
        Ok(fresh)
    }
}

impl fmt::Debug for RecordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordList")
            .field("cid", &self.cid)
            .field("type_name", &self.type_name)
            .field("members", &self.members)
            .finish()
    }
}

impl CollectionChild for RecordList {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn invoke(
        &mut self,
        method: &str,
        items: Vec<Attributes>,
        options: &SetOptions,
    ) -> CompositeResult<()> {
        match method {
            "add" => self.add(items, options).map(|_| ()),
            "reset" => self.reset_members(items, options),
            "set" => self.merge(items, options),
            other => Err(unsupported(&self.type_name, other)),
        }
    }

    fn reset(&mut self, items: Vec<Attributes>, options: &SetOptions) -> CompositeResult<()> {
        self.reset_members(items, options)
    }

    fn subscribe(&mut self, listener: Listener) {
        self.listeners.subscribe(listener);
    }

    fn to_json(&self) -> Value {
        Value::Array(self.members.iter().map(EntityChild::to_json).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Factory for [`RecordList`]s of one named type
#[derive(Debug, Clone)]
pub struct RecordListType {
    name: String,
    model: RecordType,
}

impl RecordListType {
    /// Declare a list type whose members are built by `model`
    pub fn new(name: impl Into<String>, model: RecordType) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }
}

impl CollectionFactory for RecordListType {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> &[&'static str] {
        RECORD_LIST_METHODS
    }

    fn create(
        &self,
        items: Vec<Attributes>,
        _options: &SetOptions,
    ) -> CompositeResult<Box<dyn CollectionChild>> {
        let mut list = RecordList::new(self.name.clone(), self.model.clone());
        list.members = list.build_unique(items, &[])?;
        Ok(Box::new(list))
    }
}

fn unsupported(type_name: &str, method: &str) -> CompositeError {
    CompositeError::InvalidChildData {
        type_name: type_name.to_string(),
        reason: format!("unsupported update method '{method}'"),
    }
}
