// Copyright 2025 Cowboy AI, LLC.

//! Error types for composite configuration and synchronization

use thiserror::Error;

/// Errors that can occur while building or synchronizing a composite
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositeError {
    /// A configuration source was present but did not evaluate to a mapping
    #[error("Invalid composite configuration from {source_name}: expected an object, found {found}")]
    InvalidConfiguration {
        /// Which source was rejected (`class` or `instance`)
        source_name: String,
        /// JSON kind that was found instead
        found: String,
    },

    /// A descriptor entry has the wrong shape
    #[error("Invalid composite descriptor for '{attribute}': {reason}")]
    InvalidDescriptor {
        /// Attribute key of the descriptor
        attribute: String,
        /// What was wrong with it
        reason: String,
    },

    /// A verbose descriptor did not name a child type
    #[error("Composite descriptor for '{attribute}' has no child type")]
    MissingChildType {
        /// Attribute key of the descriptor
        attribute: String,
    },

    /// The declared child type is not a registered entity or collection type
    #[error("Unknown child type {type_name} for '{attribute}'")]
    UnknownChildType {
        /// Attribute key of the descriptor
        attribute: String,
        /// The declared type, rendered as JSON
        type_name: String,
    },

    /// The parse transform is not a registered parse function
    #[error("Invalid parse function for '{attribute}'")]
    InvalidParseFunction {
        /// Attribute key of the descriptor
        attribute: String,
    },

    /// The child property would shadow a member of the host
    #[error("Property conflict: '{property}' (attribute '{attribute}') is already a host member")]
    PropertyConflict {
        /// Attribute key of the descriptor
        attribute: String,
        /// Resolved property name
        property: String,
    },

    /// Two descriptors resolved to the same child property
    #[error("Duplicate child property '{property}' for attributes '{first}' and '{second}'")]
    DuplicateProperty {
        /// Resolved property name
        property: String,
        /// Attribute that claimed the property first
        first: String,
        /// Attribute that claimed it again
        second: String,
    },

    /// The update method is not a capability of the child type
    #[error("Unknown update method '{method}' on child type {type_name} for '{attribute}'")]
    UnknownUpdateMethod {
        /// Attribute key of the descriptor
        attribute: String,
        /// Requested method name
        method: String,
        /// Child type name
        type_name: String,
    },

    /// A child received data it cannot hold
    #[error("Invalid data for child type {type_name}: {reason}")]
    InvalidChildData {
        /// Child type name
        type_name: String,
        /// What was wrong with the data
        reason: String,
    },

    /// A child's own validation rejected incoming data
    #[error("Validation error: {0}")]
    Validation(String),

    /// The persistence collaborator failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for composite operations
pub type CompositeResult<T> = Result<T, CompositeError>;

impl From<serde_json::Error> for CompositeError {
    fn from(err: serde_json::Error) -> Self {
        CompositeError::Serialization(err.to_string())
    }
}

impl CompositeError {
    /// Create a descriptor shape error
    pub fn invalid_descriptor(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        CompositeError::InvalidDescriptor {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error was raised while normalizing the configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CompositeError::InvalidConfiguration { .. }
                | CompositeError::InvalidDescriptor { .. }
                | CompositeError::MissingChildType { .. }
                | CompositeError::UnknownChildType { .. }
                | CompositeError::InvalidParseFunction { .. }
                | CompositeError::PropertyConflict { .. }
                | CompositeError::DuplicateProperty { .. }
                | CompositeError::UnknownUpdateMethod { .. }
        )
    }

    /// Check if this error came from data rejected by a child
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            CompositeError::InvalidChildData { .. } | CompositeError::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test error display messages
    #[test]
    fn test_error_display_messages() {
        let err = CompositeError::InvalidConfiguration {
            source_name: "class".to_string(),
            found: "number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid composite configuration from class: expected an object, found number"
        );

        let err = CompositeError::PropertyConflict {
            attribute: "fetch".to_string(),
            property: "fetch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Property conflict: 'fetch' (attribute 'fetch') is already a host member"
        );

        let err = CompositeError::UnknownUpdateMethod {
            attribute: "submodel".to_string(),
            method: "dummy".to_string(),
            type_name: "Folder".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown update method 'dummy' on child type Folder for 'submodel'"
        );

        let err = CompositeError::Validation("size must be positive".to_string());
        assert_eq!(err.to_string(), "Validation error: size must be positive");
    }

    /// Test the classification helpers
    #[test]
    fn test_error_classification() {
        let config_errors = vec![
            CompositeError::invalid_descriptor("a", "not an object"),
            CompositeError::MissingChildType {
                attribute: "a".to_string(),
            },
            CompositeError::UnknownChildType {
                attribute: "a".to_string(),
                type_name: "1".to_string(),
            },
            CompositeError::InvalidParseFunction {
                attribute: "a".to_string(),
            },
            CompositeError::DuplicateProperty {
                property: "p".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            },
        ];
        for err in config_errors {
            assert!(err.is_config_error(), "{err} should be a config error");
            assert!(!err.is_data_error());
        }

        let data = CompositeError::InvalidChildData {
            type_name: "Versions".to_string(),
            reason: "expected an array".to_string(),
        };
        assert!(data.is_data_error());
        assert!(!data.is_config_error());

        let backend = CompositeError::Backend("offline".to_string());
        assert!(!backend.is_config_error());
        assert!(!backend.is_data_error());
    }

    /// Test serde_json error conversion
    #[test]
    fn test_serde_json_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: CompositeError = serde_err.into();
        match err {
            CompositeError::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Serialization, got {other:?}"),
        }
    }
}
