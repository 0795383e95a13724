//! Document schemas and the registry that owns them
//!
//! Schemas are registered once and addressed by an opaque `SchemaId`.
//! Embedded sub-schemas are referenced by id, which is how a schema can embed
//! itself (directly or as a list of itself) without an ownership cycle.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::QueryResult;
use crate::refs::RefOptions;
use crate::store::Connection;

pub mod document;
mod validate;

pub use document::Document;

/// Opaque schema handle assigned at registration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(pub Uuid);

impl SchemaId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element type of an array field
#[derive(Clone)]
pub enum ElementKind {
    /// Plain values, optionally carrying their own reference metadata
    Scalar {
        /// Reference metadata declared on the element type
        reference: Option<RefOptions>,
    },
    /// Embedded sub-documents
    Embedded(SchemaId),
}

/// Declared type of a field
#[derive(Clone)]
pub enum FieldKind {
    /// Single plain value
    Scalar,
    /// Single embedded sub-document
    Embedded(SchemaId),
    /// Array of elements
    Array(ElementKind),
}

impl FieldKind {
    /// Array of plain values
    pub fn array() -> Self {
        FieldKind::Array(ElementKind::Scalar { reference: None })
    }

    /// Array of plain values whose element type carries reference metadata
    pub fn array_of_refs(reference: RefOptions) -> Self {
        FieldKind::Array(ElementKind::Scalar {
            reference: Some(reference),
        })
    }

    /// Array of embedded sub-documents
    pub fn array_of(schema: SchemaId) -> Self {
        FieldKind::Array(ElementKind::Embedded(schema))
    }

    /// Whether values of this field are arrays
    pub fn is_array(&self) -> bool {
        matches!(self, FieldKind::Array(_))
    }

    /// Sub-schema embedded by this field, if any
    pub fn embedded_schema(&self) -> Option<SchemaId> {
        match self {
            FieldKind::Embedded(id) | FieldKind::Array(ElementKind::Embedded(id)) => Some(*id),
            _ => None,
        }
    }
}

/// Inputs handed to a field check for one validation attempt
pub struct FieldContext<'a> {
    /// Document owning the field (a sub-document view for embedded fields)
    pub document: &'a Document,
    /// Field path relative to `document`
    pub path: &'a str,
    /// Current value, `None` when missing
    pub value: Option<&'a Value>,
}

/// Asynchronous per-field check attached to a schema
///
/// `Ok(false)` is a validation failure; `Err` is an operation failure.
pub trait FieldCheck: Send + Sync {
    /// Run the check for one validation attempt
    fn check<'a>(&'a self, ctx: FieldContext<'a>) -> BoxFuture<'a, QueryResult<bool>>;
}

/// A check plus the message template reported when it fails
#[derive(Clone)]
pub struct FieldValidator {
    /// Message template; `{PATH}` is replaced with the field path
    pub message: String,
    /// The check itself
    pub check: Arc<dyn FieldCheck>,
}

impl FieldValidator {
    /// Render the message for a concrete path
    pub fn render(&self, path: &str) -> String {
        self.message.replace("{PATH}", path)
    }
}

/// A declared field
#[derive(Clone)]
pub struct FieldDef {
    /// Field path (dotted for nested plain objects)
    pub path: String,
    /// Declared type
    pub kind: FieldKind,
    /// Reference metadata declared on the field itself
    pub reference: Option<RefOptions>,
    /// Attached validators, run in order
    pub validators: Vec<FieldValidator>,
}

impl FieldDef {
    /// Declare a field of the given kind
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
            reference: None,
            validators: Vec::new(),
        }
    }

    /// Attach reference metadata to the field
    pub fn with_reference(mut self, reference: RefOptions) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// A document schema: ordered field declarations
#[derive(Clone, Default)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field (builder form)
    pub fn field(mut self, field: FieldDef) -> Self {
        self.add_field(field);
        self
    }

    /// Declare a field, replacing any previous declaration of the same path
    pub fn add_field(&mut self, field: FieldDef) {
        match self.fields.iter_mut().find(|f| f.path == field.path) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Declared fields in order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by path
    pub fn get(&self, path: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// Attach a validator to a declared field. Returns false if the path is unknown.
    pub fn add_validator(&mut self, path: &str, validator: FieldValidator) -> bool {
        match self.fields.iter_mut().find(|f| f.path == path) {
            Some(field) => {
                field.validators.push(validator);
                true
            }
            None => false,
        }
    }
}

/// Owner of all registered schemas plus the default connection
pub struct SchemaRegistry {
    schemas: HashMap<SchemaId, Schema>,
    connection: Arc<dyn Connection>,
}

impl SchemaRegistry {
    /// Create a registry whose schemas query `connection` unless told otherwise
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            schemas: HashMap::new(),
            connection,
        }
    }

    /// Reserve an id before the schema body exists (for self-embedding schemas)
    pub fn reserve(&mut self) -> SchemaId {
        let id = SchemaId::new();
        self.schemas.insert(id, Schema::new());
        id
    }

    /// Register a schema and return its handle
    pub fn register(&mut self, schema: Schema) -> SchemaId {
        let id = SchemaId::new();
        self.schemas.insert(id, schema);
        id
    }

    /// Replace the body of a registered (or reserved) schema
    pub fn define(&mut self, id: SchemaId, schema: Schema) {
        self.schemas.insert(id, schema);
    }

    /// Get a schema by id
    pub fn get(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(&id)
    }

    /// Get a mutable schema by id
    pub fn get_mut(&mut self, id: SchemaId) -> Option<&mut Schema> {
        self.schemas.get_mut(&id)
    }

    /// The registry's default connection
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}
