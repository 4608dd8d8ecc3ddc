// Copyright 2025 Cowboy AI, LLC.

//! Sync engine: applies a changed-attributes payload to the child slots
//!
//! For every descriptor, in map order:
//!
//! | payload for the key | action |
//! |---|---|
//! | absent, `create_missing` | ensure-or-clear |
//! | absent | nothing |
//! | `null` | ensure-or-clear |
//! | any other value | populate |
//!
//! Each descriptor is fully resolved before the next one starts. A child
//! error stops the pass; descriptors already handled keep their new state.

use crate::child::{ChildInstance, ChildKind};
use crate::descriptor::{ChildDescriptor, CompositeMap};
use crate::errors::CompositeResult;
use crate::options::{Attributes, SetOptions};
use serde_json::Value;
use tracing::{debug, trace};

/// What the sync engine needs from the record that owns the child slots
pub trait CompositeHost {
    /// Flat attribute store
    fn attributes(&self) -> &Attributes;

    /// Read one attribute
    fn get(&self, key: &str) -> Option<&Value> {
        self.attributes().get(key)
    }

    /// Check if `name` is already taken by a member of the host
    fn is_member(&self, name: &str) -> bool;

    /// Child held under `property`, if the slot is occupied
    fn slot(&self, property: &str) -> Option<&ChildInstance>;

    /// Mutable child held under `property`
    fn slot_mut(&mut self, property: &str) -> Option<&mut ChildInstance>;

    /// Put a newly constructed child into an empty slot
    fn fill_slot(&mut self, property: &str, child: ChildInstance);
}

/// Propagate `changed` into the host's child slots
pub fn sync<H: CompositeHost>(
    map: &CompositeMap,
    host: &mut H,
    changed: &Attributes,
    options: &SetOptions,
) -> CompositeResult<()> {
    for descriptor in map.iter() {
        match changed.get(&descriptor.attribute) {
            Some(Value::Null) => ensure_or_clear(descriptor, host, options)?,
            Some(value) => populate(descriptor, host, value.clone(), options)?,
            None if options.flags.create_missing => ensure_or_clear(descriptor, host, options)?,
            None => trace!(attribute = %descriptor.attribute, "not in payload, slot left untouched"),
        }
    }
    Ok(())
}

/// Make sure the slot exists, or empty it when the flags ask for that
fn ensure_or_clear<H: CompositeHost>(
    descriptor: &ChildDescriptor,
    host: &mut H,
    options: &SetOptions,
) -> CompositeResult<()> {
    let call = options.layered_over(&descriptor.options);
    match host.slot_mut(&descriptor.property) {
        Some(child) => {
            if call.flags.clears_children() {
                debug!(
                    attribute = %descriptor.attribute,
                    property = %descriptor.property,
                    kind = %descriptor.kind(),
                    "clearing child"
                );
                child.clear(&call)?;
            }
        }
        None if call.flags.create_missing => {
            debug!(
                attribute = %descriptor.attribute,
                property = %descriptor.property,
                child_type = descriptor.child_type.type_name(),
                "creating empty child"
            );
            let child = descriptor.child_type.create(None, &call)?;
            host.fill_slot(&descriptor.property, child);
        }
        None => {}
    }
    Ok(())
}

/// Push a value into the slot, constructing the child on first use
fn populate<H: CompositeHost>(
    descriptor: &ChildDescriptor,
    host: &mut H,
    value: Value,
    options: &SetOptions,
) -> CompositeResult<()> {
    let call = options.layered_over(&descriptor.options);
    let value = match &descriptor.parse {
        Some(parse) => parse.call(&*host, value, &call)?,
        None => value,
    };
    let value = empty_if_null(descriptor.kind(), value);

    match host.slot_mut(&descriptor.property) {
        Some(child) => {
            debug!(
                attribute = %descriptor.attribute,
                method = %descriptor.method,
                strips_stale = call.flags.strips_stale(),
                "updating child"
            );
            child.update(&descriptor.method, value, &call)
        }
        None => {
            debug!(
                attribute = %descriptor.attribute,
                property = %descriptor.property,
                child_type = descriptor.child_type.type_name(),
                "creating child from value"
            );
            let child = descriptor.child_type.create(Some(value), &call)?;
            host.fill_slot(&descriptor.property, child);
            Ok(())
        }
    }
}

/// A parse transform returning `null` means "no data"
fn empty_if_null(kind: ChildKind, value: Value) -> Value {
    match (kind, value) {
        (ChildKind::Entity, Value::Null) => Value::Object(Attributes::new()),
        (ChildKind::Collection, Value::Null) => Value::Array(Vec::new()),
        (_, value) => value,
    }
}
