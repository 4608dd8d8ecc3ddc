// Copyright 2025 Cowboy AI, LLC.

//! # CIM Composite
//!
//! Composite records for the Composable Information Machine.
//!
//! A composite host keeps a flat attribute store in which selected
//! attributes back live child objects: a single nested record (an *entity*
//! child) or an ordered list of records (a *collection* child). Every
//! attribute-setting operation on the host is propagated to its children.
//!
//! - **Normalizer**: turns shorthand or verbose configuration into a
//!   canonical [`CompositeMap`]
//! - **Sync engine**: routes each changed attribute into its child slot,
//!   creating, updating, refreshing or clearing the child
//! - **Children**: [`EntityChild`] and [`CollectionChild`] traits with the
//!   built-in [`Record`] and [`RecordList`] implementations
//! - **Host**: [`CompositeModel`] with set, unset, clear, fetch, save and
//!   serialization
//!
//! ## Design Principles
//!
//! 1. **Declared once**: the composite map is built at construction and
//!    never changes afterwards
//! 2. **Stable identity**: a child slot, once filled, keeps the same child
//!    for the host's lifetime
//! 3. **Named wiring**: configuration is plain JSON; child types and parse
//!    functions are resolved through a [`TypeRegistry`]

#![warn(missing_docs)]

mod backend;
mod child;
mod descriptor;
mod errors;
mod events;
mod model;
mod normalizer;
mod options;
mod record;
mod registry;
pub mod sync_engine;

pub use backend::{Backend, InMemoryBackend};
pub use child::{
    collection_data, entity_data, ChildInstance, ChildKind, ChildType, CollectionChild,
    CollectionFactory, EntityChild, EntityFactory,
};
pub use descriptor::{ChildDescriptor, CompositeMap, DescriptorSummary};
pub use errors::{CompositeError, CompositeResult};
pub use events::{Listener, Listeners, ModelEvent};
pub use model::{CompositeModel, ModelClass, ModelClassBuilder, ModelOptions};
pub use normalizer::{CompositeConfig, ConfigCallback, Normalizer};
pub use options::{Attributes, SetOptions, SyncFlags};
pub use record::{
    Record, RecordList, RecordListType, RecordType, Validator, RECORD_LIST_METHODS,
    RECORD_METHODS,
};
pub use registry::{ParseCallback, ParseFn, TypeRegistry};
pub use sync_engine::{sync, CompositeHost};
