// Copyright 2025 Cowboy AI, LLC.

//! Change notifications emitted by hosts and children

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Something observable that happened to a host, record or collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModelEvent {
    /// Attributes were assigned or removed
    Change {
        /// Keys whose values changed, in assignment order
        changed: Vec<String>,
    },
    /// Members were appended to a collection
    Add {
        /// Number of appended members
        count: usize,
    },
    /// Members were removed from a collection
    Remove {
        /// Number of removed members
        count: usize,
    },
    /// A collection's members were replaced wholesale
    Reset {
        /// Member count after the reset
        len: usize,
    },
    /// A validating set was rejected
    Invalid {
        /// Validator message
        reason: String,
    },
    /// A backend round trip completed
    Sync,
}

impl ModelEvent {
    /// Short name of the event kind
    pub fn name(&self) -> &'static str {
        match self {
            ModelEvent::Change { .. } => "change",
            ModelEvent::Add { .. } => "add",
            ModelEvent::Remove { .. } => "remove",
            ModelEvent::Reset { .. } => "reset",
            ModelEvent::Invalid { .. } => "invalid",
            ModelEvent::Sync => "sync",
        }
    }
}

/// Callback invoked for every emitted event
pub type Listener = Arc<dyn Fn(&ModelEvent) + Send + Sync>;

/// Ordered set of listeners owned by one observable object
#[derive(Clone, Default)]
pub struct Listeners {
    listeners: Vec<Listener>,
}

impl Listeners {
    /// Create an empty listener set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Deliver an event to every listener in registration order
    pub fn emit(&self, event: &ModelEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Check if nobody is listening
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_listeners_receive_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        for tag in ["first", "second"] {
            let seen = seen.clone();
            listeners.subscribe(Arc::new(move |event: &ModelEvent| {
                seen.lock().unwrap().push(format!("{tag}:{}", event.name()));
            }));
        }

        listeners.emit(&ModelEvent::Add { count: 1 });
        listeners.emit(&ModelEvent::Sync);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:add", "second:add", "first:sync", "second:sync"]
        );
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ModelEvent::Change {
            changed: vec!["id".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "change");
        assert_eq!(json["changed"][0], "id");

        let back: ModelEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
