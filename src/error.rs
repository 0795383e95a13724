//! Error types for reference validation
//!
//! Infrastructure failures (`QueryError`) are kept apart from field-level
//! validation failures (`ValidationErrors`) so callers can tell a bad
//! reference from an unreachable store.

use std::fmt;
use thiserror::Error;

use crate::schema::SchemaId;

/// Failure to execute a count query against a collection
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The backing store could not be reached
    #[error("Connection unavailable: {0}")]
    Unavailable(String),

    /// No collection name could be resolved for a reference field
    #[error("No target collection resolved for path '{path}'")]
    UnresolvedCollection {
        /// Field path whose target resolved to nothing
        path: String,
    },

    /// The connection does not know the requested collection
    #[error("Collection '{0}' does not exist")]
    UnknownCollection(String),

    /// Backend-specific failure, cause text preserved verbatim
    #[error("{0}")]
    Backend(String),
}

/// Convenience result alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Misconfiguration detected while installing validators on a schema
#[derive(Debug, Error)]
pub enum InstallError {
    /// A field declares more than one way of locating its target collection
    #[error("Field '{path}' declares more than one reference target strategy")]
    ConflictingTargets {
        /// Offending field path
        path: String,
    },

    /// Schema handle is not registered
    #[error("Schema {0} is not registered")]
    UnknownSchema(SchemaId),
}

/// Convenience result alias for install operations
pub type InstallResult<T> = std::result::Result<T, InstallError>;

/// A single failed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Full dotted path of the field
    pub path: String,
    /// Rendered message, `{PATH}` already substituted
    pub message: String,
}

/// Per-field validation failures for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed field
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Whether no field failed
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed fields
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Look up the failure recorded for a path
    pub fn get(&self, path: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.path == path)
    }

    /// Iterate over failures in validation order
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Failed paths, in validation order
    pub fn paths(&self) -> Vec<&str> {
        self.errors.iter().map(|error| error.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Outcome of validating a document
#[derive(Debug, Error)]
pub enum ValidateError {
    /// One or more fields failed validation
    #[error("Validation failed: {0}")]
    Invalid(ValidationErrors),

    /// A query could not be executed; not a validation verdict
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Schema handle is not registered
    #[error("Schema {0} is not registered")]
    UnknownSchema(SchemaId),
}

impl ValidateError {
    /// Field failures, if this is a validation verdict
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ValidateError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type for document validation
pub type ValidateResult<T> = std::result::Result<T, ValidateError>;
