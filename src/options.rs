// Copyright 2025 Cowboy AI, LLC.

//! Flags and call options carried by every attribute-setting operation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat attribute store of a host or entity child
pub type Attributes = Map<String, Value>;

/// Intent flags that steer how children react to a synchronization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncFlags {
    /// Construction-time pass: build empty children for absent keys
    pub create_missing: bool,
    /// The listed attributes are being removed from the host
    pub unsetting: bool,
    /// The payload is a complete reload of the host's data
    pub full_refresh: bool,
    /// The payload is a save response and may be partial
    pub validating: bool,
}

impl SyncFlags {
    /// Whether fields held by a child but missing from the payload are stale
    pub fn strips_stale(&self) -> bool {
        self.full_refresh && !self.validating
    }

    /// Whether an occupied slot receiving no value should be emptied
    pub fn clears_children(&self) -> bool {
        self.unsetting || self.strips_stale()
    }
}

/// Options passed to a host setter and forwarded to child calls
///
/// `extra` is an opaque object. Descriptor options are laid underneath it
/// before it reaches a child, so values given by the caller win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Intent flags
    pub flags: SyncFlags,
    /// Suppress change notifications
    pub silent: bool,
    /// Opaque options forwarded to children
    pub extra: Map<String, Value>,
}

impl SetOptions {
    /// Plain options with no flags set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the call as removing attributes
    pub fn unsetting(mut self) -> Self {
        self.flags.unsetting = true;
        self
    }

    /// Mark the call as a complete reload
    pub fn full_refresh(mut self) -> Self {
        self.flags.full_refresh = true;
        self
    }

    /// Mark the call as a save response
    pub fn validating(mut self) -> Self {
        self.flags.validating = true;
        self
    }

    /// Mark the call as the construction-time pass
    pub fn create_missing(mut self) -> Self {
        self.flags.create_missing = true;
        self
    }

    /// Suppress notifications
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Add an opaque option
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Options for a child call: `defaults` underneath the caller's extras
    pub fn layered_over(&self, defaults: &Map<String, Value>) -> Self {
        let mut extra = defaults.clone();
        for (key, value) in &self.extra {
            extra.insert(key.clone(), value.clone());
        }
        Self {
            flags: self.flags,
            silent: self.silent,
            extra,
        }
    }

    /// Copy of these options that emits nothing
    pub fn quiet(&self) -> Self {
        Self {
            silent: true,
            ..self.clone()
        }
    }
}
