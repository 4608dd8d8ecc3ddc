// Copyright 2025 Cowboy AI, LLC.

//! Persistence seam used by fetch and save

use crate::errors::{CompositeError, CompositeResult};
use crate::model::CompositeModel;
use crate::options::Attributes;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Where host data is read from and written to
pub trait Backend: Send + Sync {
    /// Full attribute payload for `model`
    fn read(&self, model: &CompositeModel) -> CompositeResult<Attributes>;

    /// Persist `model` and return the response attributes, possibly partial
    fn write(&self, model: &CompositeModel) -> CompositeResult<Attributes>;
}

/// Backend keeping serialized hosts in memory, keyed by id
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    storage: Arc<RwLock<HashMap<String, Attributes>>>,
}

impl InMemoryBackend {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored record
    pub fn insert(&self, id: impl Into<String>, attributes: Attributes) -> CompositeResult<()> {
        self.storage
            .write()
            .map_err(|_| poisoned())?
            .insert(id.into(), attributes);
        Ok(())
    }

    /// Stored record for `id`
    pub fn get(&self, id: &str) -> CompositeResult<Option<Attributes>> {
        Ok(self.storage.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    /// Number of stored records
    pub fn len(&self) -> CompositeResult<usize> {
        Ok(self.storage.read().map_err(|_| poisoned())?.len())
    }
}

impl Backend for InMemoryBackend {
    fn read(&self, model: &CompositeModel) -> CompositeResult<Attributes> {
        let id = model
            .id()
            .map(storage_key)
            .ok_or_else(|| CompositeError::Backend("cannot read a record without an id".to_string()))?;
        self.get(&id)?
            .ok_or_else(|| CompositeError::Backend(format!("no record stored under id {id}")))
    }

    fn write(&self, model: &CompositeModel) -> CompositeResult<Attributes> {
        let mut record = match model.to_json() {
            Value::Object(map) => map,
            other => {
                return Err(CompositeError::Serialization(format!(
                    "host serialized to {other}, not an object"
                )))
            }
        };
        let id = match model.id() {
            Some(id) => storage_key(id),
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        debug!(%id, fields = record.len(), "storing record");
        self.insert(id, record.clone())?;
        Ok(record)
    }
}

fn storage_key(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

fn poisoned() -> CompositeError {
    CompositeError::Backend("storage lock poisoned".to_string())
}
