//! Refguard – reference existence validation for document schemas
//!
//! Fields that reference documents in another collection (by static name,
//! per-document resolver, or a field holding the collection name) are checked
//! at validation time with a single count query:
//! - Schemas are walked once; reference fields get a validator attached
//! - Unchanged references are never re-checked
//! - Array references cost one query regardless of length
//! - Conditions may be computed from the document being validated
//! - Checks read through the document's session when it has one

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Error taxonomy
pub mod error;

/// Manifest-driven scenarios (used by the CLI)
pub mod manifest;

/// Reference validator: options, conditions, checker, installer
pub mod refs;

/// Schemas, documents and the validation driver
pub mod schema;

/// Collection query interface and in-memory store
pub mod store;

// Re-export key types for convenience
pub use error::{QueryError, ValidateError, ValidationErrors};
pub use refs::{ConditionValue, RefOptions, RefValidator, ValidatorConfig};
pub use schema::{Document, FieldDef, FieldKind, Schema, SchemaId, SchemaRegistry};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
