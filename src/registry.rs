// Copyright 2025 Cowboy AI, LLC.

//! Named child types and parse functions referenced by configuration
//!
//! Composite configuration is plain JSON, so it names child types and parse
//! transforms by string. A [`TypeRegistry`] resolves those names.

use crate::child::ChildType;
use crate::errors::CompositeResult;
use crate::options::SetOptions;
use crate::sync_engine::CompositeHost;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Signature of a parse transform; the host is passed as context
pub type ParseCallback =
    dyn Fn(&dyn CompositeHost, Value, &SetOptions) -> CompositeResult<Value> + Send + Sync;

/// A named parse transform applied before data reaches a child
#[derive(Clone)]
pub struct ParseFn {
    name: String,
    func: Arc<ParseCallback>,
}

impl ParseFn {
    /// Wrap a closure under a name
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn CompositeHost, Value, &SetOptions) -> CompositeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform `value` with `host` as context
    pub fn call(&self, host: &dyn CompositeHost, value: Value, options: &SetOptions) -> CompositeResult<Value> {
        (self.func)(host, value, options)
    }
}

impl fmt::Debug for ParseFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParseFn").field(&self.name).finish()
    }
}

/// Lookup table of child types and parse functions
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, ChildType>,
    parsers: IndexMap<String, ParseFn>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a child type under its own name, replacing any previous one
    pub fn register(&mut self, child_type: ChildType) {
        self.types.insert(child_type.type_name().to_string(), child_type);
    }

    /// Register a parse function under its own name
    pub fn register_parser(&mut self, parser: ParseFn) {
        self.parsers.insert(parser.name().to_string(), parser);
    }

    /// Builder form of [`TypeRegistry::register`]
    pub fn with_type(mut self, child_type: ChildType) -> Self {
        self.register(child_type);
        self
    }

    /// Builder form of [`TypeRegistry::register_parser`]
    pub fn with_parser<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn CompositeHost, Value, &SetOptions) -> CompositeResult<Value> + Send + Sync + 'static,
    {
        self.register_parser(ParseFn::new(name, func));
        self
    }

    /// Look up a child type
    pub fn child_type(&self, name: &str) -> Option<&ChildType> {
        self.types.get(name)
    }

    /// Look up a parse function
    pub fn parser(&self, name: &str) -> Option<&ParseFn> {
        self.parsers.get(name)
    }

    /// Registered type names in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
